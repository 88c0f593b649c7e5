use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::adapter::{
    token_from, unix_seconds, AdapterSettings, BodyEncoding, Call, FailureMode, VendorAdapter,
};
use crate::context::RequestContext;
use crate::envelope::{ErrorTable, Normalizer, SuccessRule};
use crate::http_client::{BoxFuture, HttpClient, HttpMethod, ReqwestHttpClient};
use crate::signing::Signer;
use crate::{ConfigError, TokenCache, VendorConfig, VendorError, VendorId};

const DEV_GATEWAY: &str = "https://test-gw.gatelink.example.com";
const PROD_GATEWAY: &str = "https://gw.gatelink.example.com";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const TOKEN_TTL: Duration = Duration::from_secs(2 * 60 * 60);
const SIGNATURE_FIELD: &str = "signature";
const TOKEN_FIELD: &str = "accessToken";
const DEFAULT_PAGE_SIZE: i64 = 20;

static ERRORS: ErrorTable = &[
    ("40001", "invalid access token"),
    ("40002", "access token expired"),
    ("40003", "signature verification failed"),
    ("40004", "request timestamp out of range"),
    ("40101", "account or password incorrect"),
    ("40102", "account locked"),
    ("40301", "no permission on this door"),
    ("40401", "door not found"),
    ("40402", "person not found"),
    ("42201", "access period is invalid"),
    ("50001", "door controller offline"),
    ("50002", "door controller busy"),
];

static NORMALIZER: Normalizer = Normalizer {
    success: SuccessRule::CodeEquals(0),
    code_field: "errcode",
    message_field: "errmsg",
    data_field: "data",
    errors: ERRORS,
};

/// Access-control platform: operator login token plus HMAC/MD5 `signature`.
#[derive(Clone)]
pub struct GateLinkAdapter {
    settings: AdapterSettings,
    account: String,
    password: String,
    app_key: String,
    signer: Signer,
    tokens: TokenCache,
    token_ttl: Duration,
}

impl GateLinkAdapter {
    pub const REQUIRED_FIELDS: [&'static str; 4] = ["account", "password", "app_key", "app_secret"];

    pub fn new(config: &VendorConfig, tokens: TokenCache) -> Result<Self, ConfigError> {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()), tokens)
    }

    pub fn with_http_client(
        config: &VendorConfig,
        http_client: Arc<dyn HttpClient>,
        tokens: TokenCache,
    ) -> Result<Self, ConfigError> {
        config.require_all(&Self::REQUIRED_FIELDS)?;

        Ok(Self {
            settings: AdapterSettings {
                vendor: VendorId::GateLink,
                base_url: config.gateway(DEV_GATEWAY, PROD_GATEWAY)?,
                timeout_ms: config.timeout_ms(DEFAULT_TIMEOUT_MS)?,
                shape: config.response_shape()?,
                encoding: BodyEncoding::Json,
                failure_mode: FailureMode::InBand,
                http_client,
            },
            account: config.require("account")?,
            password: config.require("password")?,
            app_key: config.require("app_key")?,
            signer: Signer::HmacMd5Base64 {
                secret: config.require("app_secret")?,
            },
            tokens,
            token_ttl: TOKEN_TTL,
        })
    }

    /// Overrides the two-hour token lifetime.
    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    fn token_key(&self) -> String {
        TokenCache::key(VendorId::GateLink, &self.account)
    }

    /// Cached operator token; `refresh` forces a new login.
    pub async fn access_token(&self, refresh: bool) -> Result<String, VendorError> {
        self.tokens
            .get_or_fetch(&self.token_key(), self.token_ttl, refresh, || async {
                let envelope = self.login().envelope().await?;
                token_from(&envelope, &[TOKEN_FIELD])
            })
            .await
    }

    /// Operator login. Signed, but never token-authenticated.
    pub fn login(&self) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("login", HttpMethod::Post, "/api/v1/auth/login");
        ctx.mark_anonymous()
            .set("account", self.account.clone())
            .set("password", self.password.clone());
        Call::new(self, ctx)
    }

    pub fn list_doors(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("list_doors", HttpMethod::Get, "/api/v1/doors");
        ctx.optional_or(input, "pageNo", 1)
            .optional_or(input, "pageSize", DEFAULT_PAGE_SIZE);
        Call::new(self, ctx)
    }

    pub fn open_door(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("open_door", HttpMethod::Post, "/api/v1/doors/open");
        ctx.require(input, "doorId");
        Call::new(self, ctx)
    }

    /// Grants a person access to the listed doors for a validity window.
    pub fn grant_access(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("grant_access", HttpMethod::Post, "/api/v1/permissions/grant");
        ctx.require(input, "personId")
            .require_array(input, "doorIds")
            .require(input, "startTime")
            .require(input, "endTime");
        Call::new(self, ctx)
    }

    pub fn revoke_access(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("revoke_access", HttpMethod::Post, "/api/v1/permissions/revoke");
        ctx.require(input, "personId").require_array(input, "doorIds");
        Call::new(self, ctx)
    }

    pub fn query_access_records(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("query_access_records", HttpMethod::Get, "/api/v1/records");
        ctx.require(input, "startTime")
            .require(input, "endTime")
            .optional_or(input, "pageNo", 1)
            .optional_or(input, "pageSize", DEFAULT_PAGE_SIZE);
        Call::new(self, ctx)
    }
}

impl std::fmt::Debug for GateLinkAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateLinkAdapter")
            .field("settings", &self.settings)
            .field("account", &self.account)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl VendorAdapter for GateLinkAdapter {
    fn settings(&self) -> &AdapterSettings {
        &self.settings
    }

    fn normalizer(&self) -> &Normalizer {
        &NORMALIZER
    }

    fn authorize<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<(), VendorError>> {
        Box::pin(async move {
            if !ctx.is_anonymous() {
                let token = self.access_token(false).await?;
                ctx.set(TOKEN_FIELD, token);
            }

            ctx.remove(SIGNATURE_FIELD);
            ctx.set("appKey", self.app_key.clone())
                .set("timestamp", unix_seconds().to_string());
            let url = self.settings.url_for(ctx.uri());
            let signature = self.signer.sign(&url, ctx.params())?;
            ctx.set(SIGNATURE_FIELD, signature);
            Ok(())
        })
    }
}
