use std::sync::Arc;

use serde_json::Value;

use crate::adapter::{
    unix_millis, AdapterSettings, BodyEncoding, Call, FailureMode, VendorAdapter,
};
use crate::context::RequestContext;
use crate::envelope::{ErrorTable, Normalizer, SuccessRule};
use crate::http_client::{BoxFuture, HttpClient, HttpMethod, ReqwestHttpClient};
use crate::signing::Signer;
use crate::{ConfigError, VendorConfig, VendorError, VendorId};

const DEV_GATEWAY: &str = "https://sandbox.parkcloud.example.com/openapi";
const PROD_GATEWAY: &str = "https://api.parkcloud.example.com/openapi";
const DEFAULT_TIMEOUT_MS: u64 = 5_000;
const SIGN_FIELD: &str = "sign";

static ERRORS: ErrorTable = &[
    ("1001", "app id does not exist"),
    ("1002", "signature verification failed"),
    ("1003", "request timestamp expired"),
    ("1004", "app id disabled"),
    ("2001", "parking lot not found"),
    ("2002", "vehicle is not in the parking lot"),
    ("2003", "monthly card already exists for this vehicle"),
    ("2004", "monthly card not found"),
    ("2005", "monthly card period is invalid"),
    ("3001", "order already paid"),
    ("3002", "payment amount does not match the fee"),
    ("3003", "parking order not found"),
    ("9999", "parking platform busy, try again later"),
];

static NORMALIZER: Normalizer = Normalizer {
    success: SuccessRule::CodeEquals(0),
    code_field: "resultCode",
    message_field: "message",
    data_field: "data",
    errors: ERRORS,
};

/// Parking management platform signed with sorted MD5 (`&key=<secret>`).
#[derive(Debug, Clone)]
pub struct ParkCloudAdapter {
    settings: AdapterSettings,
    app_id: String,
    signer: Signer,
}

impl ParkCloudAdapter {
    pub const REQUIRED_FIELDS: [&'static str; 2] = ["app_id", "app_secret"];

    pub fn new(config: &VendorConfig) -> Result<Self, ConfigError> {
        Self::with_http_client(config, Arc::new(ReqwestHttpClient::new()))
    }

    pub fn with_http_client(
        config: &VendorConfig,
        http_client: Arc<dyn HttpClient>,
    ) -> Result<Self, ConfigError> {
        config.require_all(&Self::REQUIRED_FIELDS)?;

        Ok(Self {
            settings: AdapterSettings {
                vendor: VendorId::ParkCloud,
                base_url: config.gateway(DEV_GATEWAY, PROD_GATEWAY)?,
                timeout_ms: config.timeout_ms(DEFAULT_TIMEOUT_MS)?,
                shape: config.response_shape()?,
                encoding: BodyEncoding::Json,
                failure_mode: FailureMode::InBand,
                http_client,
            },
            app_id: config.require("app_id")?,
            signer: Signer::SortedMd5 {
                secret: config.require("app_secret")?,
            },
        })
    }

    /// Vehicle presence and entry record in a parking lot.
    pub fn query_car(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("query_car", HttpMethod::Post, "/car/query");
        ctx.require(input, "carNo").require(input, "parkCode");
        Call::new(self, ctx)
    }

    pub fn query_parking_fee(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("query_parking_fee", HttpMethod::Post, "/fee/query");
        ctx.require(input, "parkCode").require(input, "carNo");
        Call::new(self, ctx)
    }

    /// Reports an off-platform payment. `amount` is in cents.
    pub fn pay_parking_fee(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("pay_parking_fee", HttpMethod::Post, "/fee/pay");
        ctx.require(input, "parkCode")
            .require(input, "carNo")
            .require(input, "orderNo")
            .require_integer(input, "amount")
            .optional(input, "payTime");
        if ctx.params().get("amount").and_then(Value::as_i64).is_some_and(|amount| amount < 0) {
            ctx.reject("amount must not be negative");
        }
        Call::new(self, ctx)
    }

    pub fn add_monthly_car(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("add_monthly_car", HttpMethod::Post, "/monthly/add");
        ctx.require(input, "parkCode")
            .require(input, "carNo")
            .require(input, "startTime")
            .require(input, "endTime")
            .optional(input, "ownerName")
            .optional_as(input, "phone", "ownerPhone");
        Call::new(self, ctx)
    }

    pub fn delete_monthly_car(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("delete_monthly_car", HttpMethod::Post, "/monthly/delete");
        ctx.require(input, "parkCode").require(input, "carNo");
        Call::new(self, ctx)
    }

    pub fn query_free_spaces(&self, input: &Value) -> Call<'_, Self> {
        let mut ctx = RequestContext::new("query_free_spaces", HttpMethod::Post, "/space/free");
        ctx.require(input, "parkCode");
        Call::new(self, ctx)
    }
}

impl VendorAdapter for ParkCloudAdapter {
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
            ctx.set("appId", self.app_id.clone())
                .set("timestamp", unix_millis());
            let signature = self.signer.sign(ctx.uri(), ctx.params())?;
            ctx.set(SIGN_FIELD, signature);
            Ok(())
        })
    }
}
