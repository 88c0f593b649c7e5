use std::sync::Arc;

use serde_json::Value;

use crate::adapter::{unix_seconds, AdapterSettings, BodyEncoding, Call, FailureMode, VendorAdapter};
use crate::context::RequestContext;
use crate::envelope::{ErrorTable, Normalizer, SuccessRule};
use crate::http_client::{BoxFuture, HttpClient, HttpMethod, ReqwestHttpClient};
use crate::signing::{RsaSigningKey, Signer};
use crate::{ConfigError, VendorConfig, VendorError, VendorId};

const DEV_GATEWAY: &str = "https://uat.trustpass.example.com/gateway";
const PROD_GATEWAY: &str = "https://api.trustpass.example.com/gateway";
const DEFAULT_TIMEOUT_MS: u64 = 10_000;
const SIGN_FIELD: &str = "sign";

static ERRORS: ErrorTable = &[
    ("1001", "merchant not found"),
    ("1002", "signature verification failed"),
    ("1003", "merchant not authorized for this service"),
    ("2001", "name and id card number do not match"),
    ("2002", "id card number format invalid"),
    ("2003", "identity source unavailable"),
    ("3001", "visitor not found"),
    ("3002", "visitor already cancelled"),
    ("3003", "visit date is in the past"),
    ("9999", "identity service unavailable"),
];

static NORMALIZER: Normalizer = Normalizer {
    success: SuccessRule::CodeText("0000"),
    code_field: "resultCode",
    message_field: "resultMsg",
    data_field: "data",
    errors: ERRORS,
};

/// Identity verification and visitor registration, RSA-signed form posts.
#[derive(Debug, Clone)]
pub struct TrustPassAdapter {
    settings: AdapterSettings,
    merchant_id: String,
    signer: Signer,
}

impl TrustPassAdapter {
    pub const REQUIRED_FIELDS: [&'static str; 2] = ["merchant_id", "private_key"];

    pub fn new(config: &VendorConfig) -> Result<Self, ConfigError> {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    /// Fails when the PEM in `private_key` cannot be parsed.
    pub fn with_http_client(
        config: &VendorConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        config.require_all(&Self::REQUIRED_FIELDS)?;

        let key = RsaSigningKey::from_pem(&config.require("private_key")?).map_err(|error| {
            ConfigError::InvalidField {
                field: String::from("private_key"),
                reason: error.message().to_owned(),
            }
        })?;

        Ok(Self {
            settings: AdapterSettings {
                vendor: VendorId::TrustPass,
                base_url: config.gateway(DEV_GATEWAY, PROD_GATEWAY)?,
                timeout_ms: config.timeout_ms(DEFAULT_TIMEOUT_MS)?,
                shape: config.response_shape()?,
                encoding: BodyEncoding::Form,
                failure_mode: FailureMode::InBand,
                http_client,
            },
            merchant_id: config.require("merchant_id")?,
            signer: Signer::Rsa { key },
        })
    }

    pub fn verify_identity(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("verify_identity", HttpMethod::Post, "/identity/verify");
        ctx.require(input, "name").require(input, "idCardNo");
        Call::new(self, ctx)
    }

    pub fn register_visitor(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("register_visitor", HttpMethod::Post, "/visitor/register");
        ctx.require(input, "name")
            .require(input, "phone")
            .require(input, "visitDate")
            .optional(input, "idCardNo");
        let phone = match ctx.params().get("phone") {
            None => None,
            Some(Value::String(text)) => Some(text.clone()),
            Some(Value::Number(number)) => Some(number.to_string()),
            Some(_) => Some(String::new()),
        };
        if phone.is_some_and(|phone| {
            phone.len() != 11 || !phone.bytes().all(|byte| byte.is_ascii_digit())
        }) {
            ctx.reject("phone must be 11 digits");
        }
        Call::new(self, ctx)
    }

    pub fn query_visitor(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("query_visitor", HttpMethod::Post, "/visitor/query");
        ctx.require(input, "visitorId");
        Call::new(self, ctx)
    }

    pub fn cancel_visitor(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("cancel_visitor", HttpMethod::Post, "/visitor/cancel");
        ctx.require(input, "visitorId");
        Call::new(self, ctx)
    }
}

impl VendorAdapter for TrustPassAdapter {
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
            ctx.remove(SIGN_FIELD);
            ctx.set("merchantId", self.merchant_id.clone())
                .set("signType", "RSA2")
                .set("timestamp", unix_seconds().to_string());
            let signature = self.signer.sign(ctx.uri(), ctx.params())?;
            ctx.set(SIGN_FIELD, signature);
            Ok(())
        })
    }
}
