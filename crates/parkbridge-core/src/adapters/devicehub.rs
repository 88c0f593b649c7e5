use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::adapter::{
    nonce, token_from, unix_millis, AdapterSettings, BodyEncoding, Call, FailureMode,
    VendorAdapter,
};
use crate::context::RequestContext;
use crate::envelope::{ErrorTable, Normalizer, SuccessRule};
use crate::http_client::{BoxFuture, HttpAuth, HttpClient, HttpMethod, ReqwestHttpClient};
use crate::signing::Signer;
use crate::{ConfigError, TokenCache, VendorConfig, VendorError, VendorId};

const DEV_GATEWAY: &str = "https://sandbox.devicehub.example.com/v2";
const PROD_GATEWAY: &str = "https://open.devicehub.example.com/v2";
const DEFAULT_TIMEOUT_MS: u64 = 8_000;
const TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);
const SIGN_HEADER: &str = "x-sign";
const DEFAULT_PAGE_SIZE: i64 = 50;

static ERRORS: ErrorTable = &[
    ("E1001", "app key not registered"),
    ("E1002", "signature verification failed"),
    ("E1003", "token invalid or expired"),
    ("E1004", "request replayed"),
    ("E2001", "device serial number already registered"),
    ("E2002", "device not found"),
    ("E2003", "device is bound to another tenant"),
    ("E2004", "unsupported device type"),
    ("E5000", "device registry internal error"),
];

static NORMALIZER: Normalizer = Normalizer {
    success: SuccessRule::FlagTrue("success"),
    code_field: "errorCode",
    message_field: "msg",
    data_field: "data",
    errors: ERRORS,
};

/// Device registry. Bearer token from `/auth/token`, ordered MD5 in `x-sign`.
///
/// Body-level failures are raised as `Upstream` errors instead of being
/// returned in the envelope.
#[derive(Clone)]
pub struct DeviceHubAdapter {
    settings: AdapterSettings,
    app_key: String,
    signer: Signer,
    tokens: TokenCache,
    token_ttl: Duration,
}

impl DeviceHubAdapter {
    pub const REQUIRED_FIELDS: [&'static str; 2] = ["app_key", "app_secret"];

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
                vendor: VendorId::DeviceHub,
                base_url: config.gateway(DEV_GATEWAY, PROD_GATEWAY)?,
                timeout_ms: config.timeout_ms(DEFAULT_TIMEOUT_MS)?,
                shape: config.response_shape()?,
                encoding: BodyEncoding::Json,
                failure_mode: FailureMode::Raise,
                http_client,
            },
            app_key: config.require("app_key")?,
            signer: Signer::OrderedMd5 {
                secret: config.require("app_secret")?,
            },
            tokens,
            token_ttl: TOKEN_TTL,
        })
    }

    pub fn with_token_ttl(mut self, ttl: Duration) -> Self {
        self.token_ttl = ttl;
        self
    }

    pub async fn access_token(&self, refresh: bool) -> Result<String, VendorError> {
        let key = TokenCache::key(VendorId::DeviceHub, &self.app_key);
        self.tokens
            .get_or_fetch(&key, self.token_ttl, refresh, || async {
                let envelope = self.authenticate().envelope().await?;
                token_from(&envelope, &["token"])
            })
            .await
    }

    /// Exchanges the app key for a bearer token.
    pub fn authenticate(&self) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("authenticate", HttpMethod::Post, "/auth/token");
        ctx.mark_anonymous().set("appKey", self.app_key.clone());
        Call::new(self, ctx)
    }

    pub fn register_device(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("register_device", HttpMethod::Post, "/devices");
        ctx.require(input, "deviceSn")
            .require(input, "deviceName")
            .require(input, "deviceType");
        Call::new(self, ctx)
    }

    pub fn query_device(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("query_device", HttpMethod::Get, "/devices/detail");
        ctx.require(input, "deviceSn");
        Call::new(self, ctx)
    }

    /// Partial update; at least one of `deviceName` / `remark` must be given.
    pub fn update_device(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("update_device", HttpMethod::Put, "/devices");
        ctx.require(input, "deviceSn")
            .optional(input, "deviceName")
            .optional(input, "remark");
        if !ctx.params().contains_key("deviceName") && !ctx.params().contains_key("remark") {
            ctx.reject("deviceName or remark is required");
        }
        Call::new(self, ctx)
    }

    pub fn unbind_device(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("unbind_device", HttpMethod::Delete, "/devices");
        ctx.require(input, "deviceSn");
        Call::new(self, ctx)
    }

    pub fn list_devices(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("list_devices", HttpMethod::Get, "/devices");
        ctx.optional_or(input, "pageNo", 1)
            .optional_or(input, "pageSize", DEFAULT_PAGE_SIZE);
        Call::new(self, ctx)
    }
}

impl std::fmt::Debug for DeviceHubAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHubAdapter")
            .field("settings", &self.settings)
            .field("app_key", &self.app_key)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

impl VendorAdapter for DeviceHubAdapter {
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
                HttpAuth::BearerToken(token).apply(ctx.headers_mut());
            }

            ctx.set("timestamp", unix_millis().to_string())
                .set("nonce", nonce());
            let signature = self.signer.sign(ctx.uri(), ctx.params())?;
            ctx.header("x-app-key", self.app_key.clone())
                .header(SIGN_HEADER, signature);
            Ok(())
        })
    }
}
