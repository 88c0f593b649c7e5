use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Canonical vendor identifiers used in cache keys, logs and the adapter factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VendorId {
    ParkCloud,
    GateLink,
    DeviceHub,
    TrustPass,
}

impl VendorId {
    pub const ALL: [Self; 4] = [
        Self::ParkCloud,
        Self::GateLink,
        Self::DeviceHub,
        Self::TrustPass,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ParkCloud => "parkcloud",
            Self::GateLink => "gatelink",
            Self::DeviceHub => "devicehub",
            Self::TrustPass => "trustpass",
        }
    }

    /// Prefix of the environment variables read by `VendorConfig::from_env`.
    pub fn env_prefix(self) -> String {
        format!("PARKBRIDGE_{}_", self.as_str().to_ascii_uppercase())
    }
}

impl Display for VendorId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VendorId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "parkcloud" => Ok(Self::ParkCloud),
            "gatelink" => Ok(Self::GateLink),
            "devicehub" => Ok(Self::DeviceHub),
            "trustpass" => Ok(Self::TrustPass),
            other => Err(ConfigError::UnknownVendor {
                value: other.to_owned(),
            }),
        }
    }
}
