//! Configuration loading, validation and CLI overrides.
//!
//! Every section has defaults, so a deployment can run without a file and
//! pass the uuid through the `UUID` environment variable alone.

mod cli;
mod defaults;
mod loader;
mod types;
mod validate;

use serde::{Deserialize, Serialize};

pub use cli::{CliOverrides, apply_overrides};
pub use loader::{ConfigError, load_config, load_or_default};
pub use types::*;
pub use validate::validate_config;
pub use veil_dns::DnsConfig;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tls: Option<TlsConfig>,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub trojan: TrojanConfig,
    #[serde(default)]
    pub websocket: WebSocketConfig,
    #[serde(default)]
    pub dns: DnsConfig,
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// The WebSocket upgrade path, always with a leading slash.
    pub fn ws_path(&self) -> String {
        match self.websocket.path.as_deref() {
            Some(p) if !p.is_empty() => normalize_path(p),
            _ => {
                let prefix: String = self
                    .auth
                    .uuid
                    .chars()
                    .take(defaults::ws_path_uuid_chars())
                    .collect();
                format!("/{prefix}")
            }
        }
    }

    /// The subscription path, always with a leading slash.
    pub fn sub_path(&self) -> String {
        normalize_path(&self.site.sub_path)
    }
}

fn normalize_path(p: &str) -> String {
    if p.starts_with('/') {
        p.to_string()
    } else {
        format!("/{p}")
    }
}
