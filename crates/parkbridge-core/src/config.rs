//! Adapter configuration.
//!
//! Vendors are configured from flat string maps, either handed in by the
//! caller or read from `PARKBRIDGE_<VENDOR>_<KEY>` environment variables.
//! Credentials are never logged.

use std::collections::BTreeMap;

use crate::context::ResponseShape;
use crate::{ConfigError, VendorId};

/// Key for an explicit gateway base URL.
pub const GATEWAY_KEY: &str = "gateway";
/// Key for an explicit gateway port.
pub const PORT_KEY: &str = "port";
pub const TIMEOUT_KEY: &str = "timeout_ms";
pub const SHAPE_KEY: &str = "response_shape";

#[derive(Clone, Default, PartialEq, Eq)]
pub struct VendorConfig {
    values: BTreeMap<String, String>,
    is_dev: bool,
}

impl VendorConfig {
    pub fn new<K, V>(values: impl IntoIterator<Item = (K, V)>, is_dev: bool) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
            is_dev,
        }
    }

    /// Collects `PARKBRIDGE_<VENDOR>_*` variables; keys are lower-cased.
    pub fn from_env(vendor: VendorId, is_dev: bool) -> Self {
        let prefix = vendor.env_prefix();
        Self::new(
            std::env::vars().filter_map(|(name, value)| {
                name.strip_prefix(&prefix)
                    .map(|key| (key.to_ascii_lowercase(), value))
            }),
            is_dev,
        )
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub const fn is_dev(&self) -> bool {
        self.is_dev
    }

    /// Non-blank value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Fails with every missing field named, not only the first.
    pub fn require_all(&self, fields: &[&str]) -> Result<(), ConfigError> {
        let missing: Vec<String> = fields
            .iter()
            .filter(|field| self.get(field).is_none())
            .map(|field| (*field).to_owned())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingFields { fields: missing })
        }
    }

    pub fn require(&self, field: &str) -> Result<String, ConfigError> {
        self.get(field)
            .map(str::to_owned)
            .ok_or_else(|| ConfigError::MissingFields {
                fields: vec![field.to_owned()],
            })
    }

    /// Base URL: explicit `gateway` or the dev/prod default, with an optional `port`.
    pub fn gateway(&self, dev_default: &str, prod_default: &str) -> Result<String, ConfigError> {
        let base = self.get(GATEWAY_KEY).unwrap_or(if self.is_dev {
            dev_default
        } else {
            prod_default
        });
        let base = base.trim_end_matches('/');

        let Some(port) = self.get(PORT_KEY) else {
            return Ok(base.to_owned());
        };
        let port: u16 = port.parse().map_err(|_| ConfigError::InvalidField {
            field: String::from(PORT_KEY),
            reason: format!("'{port}' is not a valid port"),
        })?;

        Ok(with_port(base, port))
    }

    pub fn timeout_ms(&self, default: u64) -> Result<u64, ConfigError> {
        match self.get(TIMEOUT_KEY) {
            None => Ok(default),
            Some(value) => value
                .parse()
                .ok()
                .filter(|timeout| *timeout > 0)
                .ok_or_else(|| ConfigError::InvalidField {
                    field: String::from(TIMEOUT_KEY),
                    reason: format!("'{value}' is not a positive number of milliseconds"),
                }),
        }
    }

    pub fn response_shape(&self) -> Result<ResponseShape, ConfigError> {
        self.get(SHAPE_KEY)
            .map(str::parse)
            .transpose()
            .map(Option::unwrap_or_default)
    }
}

impl std::fmt::Debug for VendorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorConfig")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .field("is_dev", &self.is_dev)
            .finish()
    }
}

/// Sets the port in the authority of `base`, replacing any existing one.
fn with_port(base: &str, port: u16) -> String {
    let authority_start = base.find("://").map_or(0, |index| index + 3);
    let authority_end = base[authority_start..]
        .find('/')
        .map_or(base.len(), |index| authority_start + index);
    let authority = &base[authority_start..authority_end];
    // IPv6 literals carry colons inside the brackets.
    let port_search_start = authority.rfind(']').map_or(0, |index| index + 1);
    let host_end = authority[port_search_start..]
        .rfind(':')
        .map_or(authority_end, |index| authority_start + port_search_start + index);

    format!("{}:{port}{}", &base[..host_end], &base[authority_end..])
}
