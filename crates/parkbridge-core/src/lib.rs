//! # Parkbridge Core
//!
//! Signed request pipeline for third-party parking, access-control,
//! device-registry and identity platforms.
//!
//! ## Overview
//!
//! Every vendor call goes through the same steps:
//!
//! - **Build** a request context from a loosely-typed JSON input, collecting
//!   every validation complaint instead of failing on the first
//! - **Authorize** it with a cached access token where the vendor needs one
//! - **Sign** it with the vendor's signature strategy
//! - **Send** it through a pluggable HTTP client with the vendor timeout
//! - **Normalize** the answer into one [`ResponseEnvelope`]
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapter`] | Adapter trait, `Call` and the execution pipeline |
//! | [`adapters`] | ParkCloud, GateLink, DeviceHub, TrustPass and the `Adapter` factory |
//! | [`cache`] | Cache backend trait and the access-token cache |
//! | [`config`] | Vendor configuration from maps or environment variables |
//! | [`context`] | Per-call request context and its builder helpers |
//! | [`envelope`] | Response envelope and per-vendor normalizers |
//! | [`error`] | Config and pipeline errors |
//! | [`http_client`] | HTTP client abstraction |
//! | [`signing`] | Signature strategies |
//! | [`vendor`] | Vendor identifiers |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use parkbridge_core::{Adapter, TokenCache, VendorId};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads PARKBRIDGE_PARKCLOUD_APP_ID / _APP_SECRET
//!     let adapter = Adapter::from_env(VendorId::ParkCloud, false, TokenCache::in_memory())?;
//!     let parking = adapter.as_park_cloud().ok_or("not a parking adapter")?;
//!
//!     let envelope = parking
//!         .query_car(&json!({ "carNo": "AB123", "parkCode": "P1" }))
//!         .envelope()
//!         .await?;
//!
//!     if envelope.is_success() {
//!         println!("{}", envelope.data);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ Operation (in)  │  require / optional / reject
//! └────────┬────────┘
//!          │ Call
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ authorize       │────▶│ TokenCache       │
//! │ (token + sign)  │     │ (CacheBackend)   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ dispatch        │────▶│ HTTP Client      │
//! │                 │     │ (reqwest/mock)   │
//! └────────┬────────┘     └──────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Normalizer      │
//! │ (Envelope)      │
//! └─────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Construction fails with [`ConfigError`]; calls fail with a classified
//! [`VendorError`]:
//!
//! ```rust
//! use parkbridge_core::{VendorError, VendorErrorKind};
//!
//! fn handle_error(error: VendorError) {
//!     match error.kind() {
//!         VendorErrorKind::Validation => {
//!             // Report to user, nothing was sent
//!         }
//!         VendorErrorKind::Transport if error.retryable() => {
//!             // Safe to try again later
//!         }
//!         VendorErrorKind::TokenAcquisition => {
//!             // Check the vendor credentials
//!         }
//!         _ => {}
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - Credentials come from config maps or environment variables and are never logged
//! - `Debug` output of adapters, signers and configs omits secret values

pub mod adapter;
pub mod adapters;
pub mod cache;
pub mod config;
pub mod context;
pub mod envelope;
pub mod error;
pub mod http_client;
pub mod signing;
pub mod vendor;

// Re-export commonly used types at crate root for convenience

// Pipeline
pub use adapter::{AdapterSettings, BodyEncoding, Call, FailureMode, Reply, VendorAdapter};

// Adapter implementations
pub use adapters::{Adapter, DeviceHubAdapter, GateLinkAdapter, ParkCloudAdapter, TrustPassAdapter};

// Caching
pub use cache::{CacheBackend, CachedToken, MemoryCache, TokenCache};

// Configuration
pub use config::VendorConfig;

// Request context
pub use context::{Params, RequestContext, ResponseShape};

// Envelope types
pub use envelope::{ErrorTable, Normalizer, ResponseEnvelope, SuccessRule};

// Error types
pub use error::{ConfigError, VendorError, VendorErrorKind};

// HTTP client types
pub use http_client::{
    BoxFuture, HttpAuth, HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse,
    ReqwestHttpClient,
};

// Signing
pub use signing::{RsaSigningKey, Signer};

// Vendor identifiers
pub use vendor::VendorId;
