use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Envelope code for vendor-level success.
pub const SUCCESS_CODE: i64 = 0;
/// Envelope code used when a failure carries no usable numeric code.
pub const UNKNOWN_FAILURE_CODE: i64 = -1;
pub const UNKNOWN_FAILURE_MESSAGE: &str = "unknown failure";

/// Uniform result returned for every vendor call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub code: i64,
    pub message: String,
    pub data: Value,
    pub raw: Value,
}

impl ResponseEnvelope {
    pub fn success(message: impl Into<String>, data: Value, raw: Value) -> Self {
        Self {
            code: SUCCESS_CODE,
            message: message.into(),
            data,
            raw,
        }
    }

    pub fn failure(code: i64, message: impl Into<String>, raw: Value) -> Self {
        let code = if code == SUCCESS_CODE {
            UNKNOWN_FAILURE_CODE
        } else {
            code
        };
        Self {
            code,
            message: message.into(),
            data: Value::Null,
            raw,
        }
    }

    pub const fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }
}

/// Static vendor error-code table.
pub type ErrorTable = &'static [(&'static str, &'static str)];

pub fn lookup_error(table: ErrorTable, code: &str) -> Option<&'static str> {
    table
        .iter()
        .find(|(candidate, _)| *candidate == code)
        .map(|(_, message)| *message)
}

/// How a vendor marks a successful body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuccessRule {
    /// Numeric code field equal to the given value.
    CodeEquals(i64),
    /// Boolean flag field that must be `true`.
    FlagTrue(&'static str),
    /// Code field whose text equals the given value.
    CodeText(&'static str),
}

/// Maps one vendor's response encoding onto [`ResponseEnvelope`].
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    pub success: SuccessRule,
    pub code_field: &'static str,
    pub message_field: &'static str,
    pub data_field: &'static str,
    pub errors: ErrorTable,
}

impl Normalizer {
    /// Normalizes a parsed body. Never fails.
    pub fn normalize(&self, body: Value) -> ResponseEnvelope {
        let Some(object) = body.as_object() else {
            return ResponseEnvelope::failure(
                UNKNOWN_FAILURE_CODE,
                "vendor response is not a JSON object",
                body,
            );
        };

        let code_text = object.get(self.code_field).and_then(scalar_text);
        let vendor_message = object
            .get(self.message_field)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|message| !message.is_empty())
            .map(str::to_owned);

        let succeeded = match self.success {
            SuccessRule::CodeEquals(expected) => object
                .get(self.code_field)
                .and_then(as_code)
                .is_some_and(|code| code == expected),
            SuccessRule::FlagTrue(field) => object.get(field).and_then(Value::as_bool) == Some(true),
            SuccessRule::CodeText(expected) => code_text.as_deref() == Some(expected),
        };

        if succeeded {
            let data = object.get(self.data_field).cloned().unwrap_or(Value::Null);
            let message = vendor_message.unwrap_or_else(|| String::from("success"));
            return ResponseEnvelope::success(message, data, body);
        }

        let code = object
            .get(self.code_field)
            .and_then(as_code)
            .unwrap_or(UNKNOWN_FAILURE_CODE);
        let message = code_text
            .as_deref()
            .and_then(|text| lookup_error(self.errors, text))
            .map(str::to_owned)
            .or(vendor_message)
            .unwrap_or_else(|| String::from(UNKNOWN_FAILURE_MESSAGE));

        ResponseEnvelope::failure(code, message, body)
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn as_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}
