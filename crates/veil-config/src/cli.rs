//! CLI override definitions and application logic.

use clap::Parser;

use crate::Config;
use crate::types::*;

/// Command-line overrides. The deployment-facing ones can also come from the
/// environment (`UUID`, `PORT`, `DOMAIN`, `WSPATH`, `SUB_PATH`, `NAME`).
#[derive(Debug, Clone, Parser, Default)]
pub struct CliOverrides {
    /// Override server listen address, e.g. 0.0.0.0:443
    #[arg(long)]
    pub listen: Option<String>,
    /// Listen on 0.0.0.0 with this port (ignored when --listen is set)
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,
    /// Shared secret UUID
    #[arg(long, env = "UUID", hide_env_values = true)]
    pub uuid: Option<String>,
    /// Public domain advertised in subscription links
    #[arg(long, env = "DOMAIN")]
    pub domain: Option<String>,
    /// WebSocket path (leading slash optional)
    #[arg(long, env = "WSPATH")]
    pub ws_path: Option<String>,
    /// Subscription path (leading slash optional)
    #[arg(long, env = "SUB_PATH")]
    pub sub_path: Option<String>,
    /// Node name used in subscription links
    #[arg(long, env = "NAME")]
    pub name: Option<String>,
    /// WebSocket host (optional)
    #[arg(long)]
    pub ws_host: Option<String>,
    /// Relay target for Trojan sessions, e.g. 127.0.0.1:80
    #[arg(long)]
    pub trojan_target: Option<String>,
    /// DNS-over-HTTPS JSON endpoint
    #[arg(long)]
    pub doh_url: Option<String>,
    /// DNS-over-HTTPS timeout (milliseconds)
    #[arg(long)]
    pub doh_timeout_ms: Option<u64>,
    /// Path to the decoy index.html
    #[arg(long)]
    pub index_file: Option<String>,
    /// Disable the startup geo/ISP lookup
    #[arg(long)]
    pub no_geoip: bool,
    /// Override TLS cert path
    #[arg(long)]
    pub tls_cert: Option<String>,
    /// Override TLS key path
    #[arg(long)]
    pub tls_key: Option<String>,
    /// Override TCP idle timeout (seconds)
    #[arg(long)]
    pub tcp_idle_timeout_secs: Option<u64>,
    /// Override upstream connect timeout (seconds)
    #[arg(long)]
    pub connect_timeout_secs: Option<u64>,
    /// Override maximum concurrent connections (0 = unlimited)
    #[arg(long)]
    pub max_connections: Option<usize>,
    /// Override metrics listen address
    #[arg(long)]
    pub metrics_listen: Option<String>,
    /// Override log level (trace/debug/info/warn/error)
    #[arg(long)]
    pub log_level: Option<String>,
}

pub fn apply_overrides(config: &mut Config, overrides: &CliOverrides) {
    if let Some(v) = &overrides.listen {
        config.server.listen = v.clone();
    } else if let Some(port) = overrides.port {
        config.server.listen = format!("0.0.0.0:{port}");
    }
    if let Some(v) = &overrides.uuid {
        config.auth.uuid = v.trim().to_string();
    }
    if let Some(v) = &overrides.domain {
        config.site.domain = Some(v.clone());
    }
    if let Some(v) = &overrides.ws_path {
        config.websocket.path = Some(v.clone());
    }
    if let Some(v) = &overrides.sub_path {
        config.site.sub_path = v.trim_start_matches('/').to_string();
    }
    if let Some(v) = &overrides.name {
        config.site.name = v.clone();
    }
    if let Some(v) = &overrides.ws_host {
        config.websocket.host = Some(v.clone());
    }
    if let Some(v) = &overrides.trojan_target {
        config.trojan.default_target = v.clone();
    }
    if let Some(v) = &overrides.doh_url {
        config.dns.doh_url = v.clone();
    }
    if let Some(v) = overrides.doh_timeout_ms {
        config.dns.timeout_ms = v;
    }
    if let Some(v) = &overrides.index_file {
        config.site.index_file = Some(v.clone());
    }
    if overrides.no_geoip {
        config.site.geoip_enabled = false;
    }
    match (&overrides.tls_cert, &overrides.tls_key) {
        (Some(cert), Some(key)) => {
            let tls = config.tls.get_or_insert_with(|| TlsConfig {
                cert: String::new(),
                key: String::new(),
                alpn: Vec::new(),
                min_version: veil_core::DEFAULT_TLS_MIN_VERSION.to_string(),
                max_version: veil_core::DEFAULT_TLS_MAX_VERSION.to_string(),
                handshake_timeout_secs: veil_core::DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS,
            });
            tls.cert = cert.clone();
            tls.key = key.clone();
        }
        (cert, key) => {
            if let Some(tls) = config.tls.as_mut() {
                if let Some(v) = cert {
                    tls.cert = v.clone();
                }
                if let Some(v) = key {
                    tls.key = v.clone();
                }
            }
        }
    }
    if let Some(v) = overrides.tcp_idle_timeout_secs {
        config.server.tcp_idle_timeout_secs = v;
    }
    if let Some(v) = overrides.connect_timeout_secs {
        config.server.connect_timeout_secs = v;
    }
    if let Some(v) = overrides.max_connections {
        config.server.max_connections = if v == 0 { None } else { Some(v) };
    }
    if let Some(v) = &overrides.metrics_listen {
        config.metrics.listen = Some(v.clone());
    }
    if let Some(v) = &overrides.log_level {
        config.logging.level = Some(v.clone());
    }
}
