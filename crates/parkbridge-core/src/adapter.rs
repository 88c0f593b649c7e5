//! Adapter contract and the per-call execution pipeline.
//!
//! An operation method on a vendor adapter validates its input into a fresh
//! [`RequestContext`] and hands it back wrapped in a [`Call`]. Nothing is
//! sent until [`Call::execute`], which runs:
//!
//! ```text
//! validated ──cancelled──▶ Validation error
//!     │
//!     ▼
//! authorized (token + signature)
//!     │
//!     ▼
//! sent ──transport failure──▶ Transport error
//!     │
//!     ▼
//! status checked ──non-2xx──▶ Upstream error
//!     │
//!     ▼
//! parsed ─▶ normalized ─▶ reply (per ResponseShape)
//! ```
//!
//! The context is moved out of the call before the first step, so the call
//! is left in its default state on every exit path.

use std::sync::Arc;

use serde_json::Value;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::context::{Params, RequestContext, ResponseShape};
use crate::envelope::{Normalizer, ResponseEnvelope};
use crate::http_client::{BoxFuture, HttpClient, HttpRequest, HttpResponse};
use crate::{VendorError, VendorId};

/// Body encoding for POST/PUT requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    Form,
}

/// What happens when the body reports a vendor-level failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Return the failure as an envelope with a non-zero code.
    InBand,
    /// Raise an `Upstream` error.
    Raise,
}

/// Transport settings shared by every call of one adapter.
#[derive(Clone)]
pub struct AdapterSettings {
    pub vendor: VendorId,
    pub base_url: String,
    pub timeout_ms: u64,
    pub shape: ResponseShape,
    pub encoding: BodyEncoding,
    pub failure_mode: FailureMode,
    pub http_client: Arc<dyn HttpClient>,
}

impl AdapterSettings {
    pub fn url_for(&self, uri: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            uri.trim_start_matches('/')
        )
    }

    /// Turns a signed context into a transport request.
    pub fn build_request(&self, ctx: &RequestContext) -> Result<HttpRequest, VendorError> {
        let method = ctx.method();
        let mut request = HttpRequest::new(method, self.url_for(ctx.uri()))
            .with_timeout_ms(self.timeout_ms)
            .with_headers(ctx.headers());

        if method.uses_query() {
            if !ctx.params().is_empty() {
                let separator = if request.url.contains('?') { '&' } else { '?' };
                request.url = format!("{}{separator}{}", request.url, form_encode(ctx.params()));
            }
            return Ok(request);
        }

        let (content_type, body) = match self.encoding {
            BodyEncoding::Json => (
                "application/json; charset=utf-8",
                serde_json::to_string(ctx.params()).map_err(|e| {
                    VendorError::validation(format!("request body is not serializable: {e}"))
                })?,
            ),
            BodyEncoding::Form => (
                "application/x-www-form-urlencoded",
                form_encode(ctx.params()),
            ),
        };

        request
            .headers
            .entry(String::from("content-type"))
            .or_insert_with(|| content_type.to_owned());
        Ok(request.with_body(body))
    }
}

impl std::fmt::Debug for AdapterSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSettings")
            .field("vendor", &self.vendor)
            .field("base_url", &self.base_url)
            .field("timeout_ms", &self.timeout_ms)
            .field("shape", &self.shape)
            .field("encoding", &self.encoding)
            .field("failure_mode", &self.failure_mode)
            .finish_non_exhaustive()
    }
}

/// Per-vendor behavior plugged into the shared pipeline.
pub trait VendorAdapter: Send + Sync {
    fn settings(&self) -> &AdapterSettings;

    fn normalizer(&self) -> &Normalizer;

    /// Attaches the access token (unless the context is anonymous) and the signature.
    fn authorize<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
    ) -> BoxFuture<'a, Result<(), VendorError>>;

    fn vendor(&self) -> VendorId {
        self.settings().vendor
    }
}

/// Value returned from [`Call::execute`], shaped by [`ResponseShape`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Envelope(ResponseEnvelope),
    Body(String),
    Response(HttpResponse),
}

impl Reply {
    pub const fn shape(&self) -> ResponseShape {
        match self {
            Self::Envelope(_) => ResponseShape::Json,
            Self::Body(_) => ResponseShape::RawBody,
            Self::Response(_) => ResponseShape::RawResponse,
        }
    }

    pub fn into_envelope(self) -> Result<ResponseEnvelope, VendorError> {
        match self {
            Self::Envelope(envelope) => Ok(envelope),
            other => Err(VendorError::validation(format!(
                "expected a json reply, got {}",
                other.shape()
            ))),
        }
    }
}

/// A built, not yet executed vendor operation.
#[must_use = "a call does nothing until `execute` is awaited"]
pub struct Call<'a, A: ?Sized> {
    adapter: &'a A,
    context: RequestContext,
}

impl<'a, A> Call<'a, A>
where
    A: VendorAdapter + ?Sized,
{
    pub fn new(adapter: &'a A, context: RequestContext) -> Self {
        Self { adapter, context }
    }

    pub fn context(&self) -> &RequestContext {
        &self.context
    }

    pub fn with_shape(mut self, shape: ResponseShape) -> Self {
        self.context.set_shape(shape);
        self
    }

    /// Runs the pipeline. The context is reset before the first await point.
    pub fn execute(&mut self) -> BoxFuture<'a, Result<Reply, VendorError>> {
        let context = self.context.take();
        Box::pin(dispatch(self.adapter, context))
    }

    /// Executes with the JSON shape and returns the normalized envelope.
    pub async fn envelope(mut self) -> Result<ResponseEnvelope, VendorError> {
        self.context.set_shape(ResponseShape::Json);
        self.execute().await?.into_envelope()
    }
}

async fn dispatch<A>(adapter: &A, mut ctx: RequestContext) -> Result<Reply, VendorError>
where
    A: VendorAdapter + ?Sized,
{
    let settings = adapter.settings();
    let vendor = settings.vendor;

    if ctx.uri().is_empty() {
        return Err(VendorError::validation("call has already been executed"));
    }

    if ctx.is_cancelled() {
        debug!(%vendor, operation = ctx.name(), complaints = ctx.errors().len(), "call cancelled before dispatch");
        return Err(VendorError::from_complaints(ctx.errors()));
    }

    adapter.authorize(&mut ctx).await?;

    let request = settings.build_request(&ctx)?;
    let shape = ctx.shape().unwrap_or(settings.shape);
    debug!(%vendor, operation = ctx.name(), method = %request.method, "dispatching vendor call");

    let response = settings
        .http_client
        .execute(request)
        .await
        .map_err(|error| {
            warn!(%vendor, operation = ctx.name(), timed_out = error.timed_out(), %error, "vendor transport failure");
            VendorError::transport(
                format!("{vendor} transport error: {}", error.message()),
                error.retryable(),
            )
        })?;

    if !response.is_success() {
        return Err(VendorError::upstream_status(
            response.status,
            format!("{vendor} returned status {}", response.status),
        ));
    }

    match shape {
        ResponseShape::RawResponse => return Ok(Reply::Response(response)),
        ResponseShape::RawBody => return Ok(Reply::Body(response.body)),
        ResponseShape::Json => {}
    }

    let body = serde_json::from_str::<Value>(&response.body)
        .unwrap_or_else(|_| Value::String(response.body));
    let envelope = adapter.normalizer().normalize(body);

    if !envelope.is_success() && settings.failure_mode == FailureMode::Raise {
        return Err(VendorError::upstream(format!(
            "{vendor} rejected {}: [{}] {}",
            ctx.name(),
            envelope.code,
            envelope.message
        )));
    }

    Ok(Reply::Envelope(envelope))
}

/// `application/x-www-form-urlencoded` rendering; nested values are JSON-encoded.
pub fn form_encode(params: &Params) -> String {
    params
        .iter()
        .filter(|(_, value)| !value.is_null())
        .map(|(key, value)| {
            let text = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&text))
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Reads a token string at `path` inside a successful login envelope.
pub fn token_from(envelope: &ResponseEnvelope, path: &[&str]) -> Result<String, VendorError> {
    if !envelope.is_success() {
        return Err(VendorError::token_acquisition(format!(
            "login rejected: [{}] {}",
            envelope.code, envelope.message
        )));
    }

    path.iter()
        .try_fold(&envelope.data, |value, key| value.get(key))
        .and_then(Value::as_str)
        .filter(|token| !token.trim().is_empty())
        .map(str::to_owned)
        .ok_or_else(|| {
            VendorError::token_acquisition(format!(
                "login response has no token at data.{}",
                path.join(".")
            ))
        })
}

pub fn unix_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn unix_seconds() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Random request nonce.
pub fn nonce() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
