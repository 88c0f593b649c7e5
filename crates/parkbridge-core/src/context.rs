//! Per-call request state and the validating builder helpers.
//!
//! Every operation builds a fresh [`RequestContext`] from a loosely-typed
//! input map. Builder helpers never fail and never perform I/O: a missing
//! or malformed required field records a complaint and marks the context
//! cancelled, and the call keeps collecting so that `execute` can report
//! every problem at once.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http_client::HttpMethod;
use crate::ConfigError;

/// Insertion-ordered parameter map sent to the vendor.
pub type Params = serde_json::Map<String, Value>;

/// Shape of the value returned from `Call::execute`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseShape {
    /// Normalized [`ResponseEnvelope`](crate::ResponseEnvelope).
    #[default]
    Json,
    /// Unparsed response text.
    RawBody,
    /// Full transport response.
    RawResponse,
}

impl ResponseShape {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::RawBody => "raw_body",
            Self::RawResponse => "raw_response",
        }
    }
}

impl Display for ResponseShape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResponseShape {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "raw_body" => Ok(Self::RawBody),
            "raw_response" => Ok(Self::RawResponse),
            other => Err(ConfigError::InvalidField {
                field: String::from("response_shape"),
                reason: format!("'{other}' is not one of json, raw_body, raw_response"),
            }),
        }
    }
}

/// Mutable state of a single vendor call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RequestContext {
    name: String,
    uri: String,
    method: HttpMethod,
    params: Params,
    headers: BTreeMap<String, String>,
    errors: Vec<String>,
    cancelled: bool,
    shape: Option<ResponseShape>,
    anonymous: bool,
}

impl RequestContext {
    pub fn new(name: impl Into<String>, method: HttpMethod, uri: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            uri: uri.into(),
            method,
            ..Self::default()
        }
    }

    /// Operation label used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub const fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.headers
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub const fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Per-call shape override; `None` defers to the adapter default.
    pub const fn shape(&self) -> Option<ResponseShape> {
        self.shape
    }

    /// Anonymous calls (vendor logins) are signed but carry no access token.
    pub const fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }

    pub fn set_shape(&mut self, shape: ResponseShape) -> &mut Self {
        self.shape = Some(shape);
        self
    }

    pub fn mark_anonymous(&mut self) -> &mut Self {
        self.anonymous = true;
        self
    }

    /// Records a complaint and cancels the call.
    pub fn reject(&mut self, complaint: impl Into<String>) -> &mut Self {
        self.errors.push(complaint.into());
        self.cancelled = true;
        self
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.params.shift_remove(key)
    }

    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers
            .insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Copies a required scalar field under the same key.
    pub fn require(&mut self, input: &Value, key: &str) -> &mut Self {
        self.require_as(input, key, key)
    }

    /// Copies a required scalar field, renaming it to the vendor's wire key.
    pub fn require_as(&mut self, input: &Value, key: &str, wire_key: &str) -> &mut Self {
        match present(input, key) {
            Some(value) if is_scalar(value) => {
                let value = value.clone();
                self.set(wire_key, value)
            }
            Some(_) => self.reject(format!("{key} must be a single value")),
            None => self.reject(format!("{key} is required")),
        }
    }

    /// Copies a required integer, accepting numbers and numeric strings.
    pub fn require_integer(&mut self, input: &Value, key: &str) -> &mut Self {
        match present(input, key).map(as_integer) {
            Some(Some(number)) => self.set(key, number),
            Some(None) => self.reject(format!("{key} must be an integer")),
            None => self.reject(format!("{key} is required")),
        }
    }

    /// Copies a required, non-empty list.
    pub fn require_array(&mut self, input: &Value, key: &str) -> &mut Self {
        match present(input, key) {
            Some(Value::Array(items)) if !items.is_empty() => {
                let items = items.clone();
                self.set(key, Value::Array(items))
            }
            Some(Value::Array(_)) | None => self.reject(format!("{key} is required")),
            Some(_) => self.reject(format!("{key} must be a list")),
        }
    }

    pub fn optional(&mut self, input: &Value, key: &str) -> &mut Self {
        self.optional_as(input, key, key)
    }

    pub fn optional_as(&mut self, input: &Value, key: &str, wire_key: &str) -> &mut Self {
        if let Some(value) = present(input, key) {
            let value = value.clone();
            self.set(wire_key, value);
        }
        self
    }

    pub fn optional_or(
        &mut self,
        input: &Value,
        key: &str,
        default: impl Into<Value>,
    ) -> &mut Self {
        let value = present(input, key)
            .cloned()
            .unwrap_or_else(|| default.into());
        self.set(key, value)
    }

    /// Restores the default state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Moves the state out, leaving a default context behind.
    pub fn take(&mut self) -> Self {
        std::mem::take(self)
    }
}

/// Looks up a field, treating `null` and blank strings as absent.
fn present<'a>(input: &'a Value, key: &str) -> Option<&'a Value> {
    match input.get(key)? {
        Value::Null => None,
        Value::String(text) if text.trim().is_empty() => None,
        value => Some(value),
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn collects_every_missing_field_before_failing() {
        let input = json!({ "parkCode": "" });
        let mut ctx = RequestContext::new("query_car", HttpMethod::Post, "/car/query");
        ctx.require(&input, "carNo").require(&input, "parkCode");

        assert!(ctx.is_cancelled());
        assert_eq!(ctx.errors(), ["carNo is required", "parkCode is required"]);
        assert!(ctx.params().is_empty());
    }

    #[test]
    fn require_as_renames_to_wire_key() {
        let input = json!({ "carNo": "AB123" });
        let mut ctx = RequestContext::new("query_car", HttpMethod::Post, "/car/query");
        ctx.require_as(&input, "carNo", "plate");

        assert!(!ctx.is_cancelled());
        assert_eq!(ctx.params().get("plate"), Some(&json!("AB123")));
    }

    #[test]
    fn require_integer_coerces_numeric_strings() {
        let input = json!({ "amount": "1500", "bad": "15.x" });
        let mut ctx = RequestContext::new("pay", HttpMethod::Post, "/pay");
        ctx.require_integer(&input, "amount").require_integer(&input, "bad");

        assert_eq!(ctx.params().get("amount"), Some(&json!(1500)));
        assert_eq!(ctx.errors(), ["bad must be an integer"]);
    }

    #[test]
    fn require_array_rejects_empty_and_scalar_values() {
        let input = json!({ "empty": [], "scalar": "d1", "doors": ["d1", "d2"] });
        let mut ctx = RequestContext::new("grant", HttpMethod::Post, "/grant");
        ctx.require_array(&input, "empty")
            .require_array(&input, "scalar")
            .require_array(&input, "doors");

        assert_eq!(
            ctx.errors(),
            ["empty is required", "scalar must be a list"]
        );
        assert_eq!(ctx.params().get("doors"), Some(&json!(["d1", "d2"])));
    }

    #[test]
    fn optional_fields_skip_null_and_blank_values() {
        let input = json!({ "phone": null, "ownerName": "  ", "remark": "vip" });
        let mut ctx = RequestContext::new("add", HttpMethod::Post, "/add");
        ctx.optional(&input, "phone")
            .optional(&input, "ownerName")
            .optional(&input, "remark")
            .optional_or(&input, "pageSize", 20);

        assert!(!ctx.is_cancelled());
        let keys: Vec<&str> = ctx.params().keys().map(String::as_str).collect();
        assert_eq!(keys, ["remark", "pageSize"]);
    }

    #[test]
    fn nested_values_are_not_accepted_as_scalars() {
        let input = json!({ "carNo": { "plate": "AB123" } });
        let mut ctx = RequestContext::new("query_car", HttpMethod::Post, "/car/query");
        ctx.require(&input, "carNo");

        assert_eq!(ctx.errors(), ["carNo must be a single value"]);
    }

    #[test]
    fn take_leaves_default_context_behind() {
        let mut ctx = RequestContext::new("query_car", HttpMethod::Get, "/car/query");
        ctx.set("carNo", "AB123").header("X-Sign", "abc").reject("boom");

        let taken = ctx.take();
        assert!(ctx.is_default());
        assert_eq!(taken.name(), "query_car");
        assert_eq!(taken.headers().get("x-sign").map(String::as_str), Some("abc"));
    }

    #[test]
    fn response_shape_parses_config_values() {
        assert_eq!("RAW_BODY".parse::<ResponseShape>(), Ok(ResponseShape::RawBody));
        assert!("xml".parse::<ResponseShape>().is_err());
    }
}
