use std::fmt::{Display, Formatter};

use thiserror::Error;

/// Separator used when several validation complaints are reported at once.
pub const VALIDATION_DELIMITER: &str = "; ";

/// Adapter construction errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required config field(s): {}", .fields.join(", "))]
    MissingFields { fields: Vec<String> },
    #[error("config field '{field}' is invalid: {reason}")]
    InvalidField { field: String, reason: String },
    #[error("unknown vendor '{value}', expected one of parkcloud, gatelink, devicehub, trustpass")]
    UnknownVendor { value: String },
}

/// Pipeline error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorErrorKind {
    /// Required input missing or invalid; raised before any network I/O.
    Validation,
    /// The login sub-call failed or produced no usable token.
    TokenAcquisition,
    /// Network failure, timeout, or unreadable transport response.
    Transport,
    /// Non-2xx status, or a body-level failure for vendors that raise.
    Upstream,
    /// Signing material could not be used.
    Signing,
}

impl VendorErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::TokenAcquisition => "token_acquisition",
            Self::Transport => "transport",
            Self::Upstream => "upstream",
            Self::Signing => "signing",
        }
    }
}

/// Structured error raised by `Call::execute` and adapter helpers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VendorError {
    kind: VendorErrorKind,
    message: String,
    retryable: bool,
    status: Option<u16>,
}

impl VendorError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::Validation,
            message: message.into(),
            retryable: false,
            status: None,
        }
    }

    /// Joins every collected complaint into a single validation error.
    pub fn from_complaints(complaints: &[String]) -> Self {
        Self::validation(complaints.join(VALIDATION_DELIMITER))
    }

    pub fn token_acquisition(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::TokenAcquisition,
            message: message.into(),
            retryable: true,
            status: None,
        }
    }

    pub fn transport(message: impl Into<String>, retryable: bool) -> Self {
        Self {
            kind: VendorErrorKind::Transport,
            message: message.into(),
            retryable,
            status: None,
        }
    }

    pub fn upstream_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::Upstream,
            message: message.into(),
            retryable: status >= 500,
            status: Some(status),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::Upstream,
            message: message.into(),
            retryable: false,
            status: None,
        }
    }

    pub fn signing(message: impl Into<String>) -> Self {
        Self {
            kind: VendorErrorKind::Signing,
            message: message.into(),
            retryable: false,
            status: None,
        }
    }

    pub const fn kind(&self) -> VendorErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    /// HTTP status for upstream errors raised from a non-2xx response.
    pub const fn status(&self) -> Option<u16> {
        self.status
    }
}

impl Display for VendorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for VendorError {}

impl From<ConfigError> for VendorError {
    fn from(error: ConfigError) -> Self {
        Self::validation(error.to_string())
    }
}
