//! Vendor adapters and the construction-time factory.

mod devicehub;
mod gatelink;
mod parkcloud;
mod trustpass;

use std::sync::Arc;

pub use devicehub::DeviceHubAdapter;
pub use gatelink::GateLinkAdapter;
pub use parkcloud::ParkCloudAdapter;
pub use trustpass::TrustPassAdapter;

use crate::http_client::{HttpClient, ReqwestHttpClient};
use crate::{ConfigError, TokenCache, VendorConfig, VendorId};

/// One constructed adapter of any vendor.
#[derive(Debug, Clone)]
pub enum Adapter {
    ParkCloud(ParkCloudAdapter),
    GateLink(GateLinkAdapter),
    DeviceHub(DeviceHubAdapter),
    TrustPass(TrustPassAdapter),
}

impl Adapter {
    /// Builds the adapter for `vendor`. Token-less vendors ignore `tokens`.
    pub fn connect(
        vendor: VendorId,
        config: &VendorConfig,
        http_client: Arc<dyn HttpClient>,
        tokens: TokenCache,
    ) -> Result<Self, ConfigError> {
        Ok(match vendor {
            VendorId::ParkCloud => {
                Self::ParkCloud(ParkCloudAdapter::with_http_client(config, http_client)?)
            }
            VendorId::GateLink => {
                Self::GateLink(GateLinkAdapter::with_http_client(config, http_client, tokens)?)
            }
            VendorId::DeviceHub => {
                Self::DeviceHub(DeviceHubAdapter::with_http_client(config, http_client, tokens)?)
            }
            VendorId::TrustPass => {
                Self::TrustPass(TrustPassAdapter::with_http_client(config, http_client)?)
            }
        })
    }

    /// Reads `PARKBRIDGE_<VENDOR>_*` and connects over the default HTTP client.
    pub fn from_env(vendor: VendorId, is_dev: bool, tokens: TokenCache) -> Result<Self, ConfigError> {
        Self::connect(
            vendor,
            &VendorConfig::from_env(vendor, is_dev),
            Arc::new(ReqwestHttpClient::new()),
            tokens,
        )
    }

    pub const fn vendor(&self) -> VendorId {
        match self {
            Self::ParkCloud(_) => VendorId::ParkCloud,
            Self::GateLink(_) => VendorId::GateLink,
            Self::DeviceHub(_) => VendorId::DeviceHub,
            Self::TrustPass(_) => VendorId::TrustPass,
        }
    }

    pub fn as_park_cloud(&self) -> Option<&ParkCloudAdapter> {
        match self {
            Self::ParkCloud(adapter) => Some(adapter),
            _ => None,
        }
    }

    pub fn as_gate_link(&self) -> Option<&GateLinkAdapter> {
        match self {
            Self::GateLink(adapter) => Some(adapter),
            _ => None,
        }
    }

    pub fn as_device_hub(&self) -> Option<&DeviceHubAdapter> {
        match self {
            Self::DeviceHub(adapter) => Some(adapter),
            _ => None,
        }
    }

    pub fn as_trust_pass(&self) -> Option<&TrustPassAdapter> {
        match self {
            Self::TrustPass(adapter) => Some(adapter),
            _ => None,
        }
    }
}
