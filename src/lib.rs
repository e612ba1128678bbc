//! # veil
//!
//! A WebSocket tunnel endpoint that speaks Vless and Trojan.
//!
//! ## Crates
//!
//! - [`veil_core`] - Defaults, stream adapters and the relay loop
//! - [`veil_proto`] - Vless and Trojan header parsing
//! - [`veil_auth`] - The shared UUID credential
//! - [`veil_config`] - Configuration loading and validation
//! - [`veil_dns`] - DNS-over-HTTPS resolution
//! - [`veil_metrics`] - Prometheus-compatible metrics
//! - [`veil_server`] - Server implementation

pub use veil_auth as auth;
pub use veil_config as config;
pub use veil_core as core;
pub use veil_dns as dns;
pub use veil_metrics as metrics;
pub use veil_proto as proto;
pub use veil_server as server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use veil_auth::{AuthBackend, MemoryAuth};
    pub use veil_config::{Config, load_config, validate_config};
    pub use veil_server::{CancellationToken, ServerError, run, run_with_shutdown};
}
