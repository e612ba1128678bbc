//! Configuration type definitions for server, TLS, auth, WebSocket, site, metrics, and logging.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::defaults::*;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen")]
    pub listen: String,
    /// Relay idle timeout.
    #[serde(default = "default_tcp_timeout_secs")]
    pub tcp_idle_timeout_secs: u64,
    /// Bound on reading the HTTP request, the upgrade and the first frame.
    #[serde(default = "default_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// How long shutdown waits for live sessions to drain.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    #[serde(default = "default_max_header_bytes")]
    pub max_header_bytes: usize,
    /// Maximum concurrent connections. Unset or 0 means unlimited.
    #[serde(default)]
    pub max_connections: Option<usize>,
    /// Buffer size for each relay direction (bytes).
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
    /// TCP listener backlog (pending connections queue size).
    #[serde(default = "default_connection_backlog")]
    pub connection_backlog: u32,
    /// TCP socket options
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            tcp_idle_timeout_secs: default_tcp_timeout_secs(),
            handshake_timeout_secs: default_handshake_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            max_header_bytes: default_max_header_bytes(),
            max_connections: None,
            relay_buffer_size: default_relay_buffer_size(),
            connection_backlog: default_connection_backlog(),
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// The effective connection cap; `0` reads as unlimited, as on the CLI.
    pub fn connection_limit(&self) -> Option<usize> {
        self.max_connections.filter(|&n| n > 0)
    }
}

/// TCP socket configuration options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpConfig {
    /// Disable Nagle's algorithm (TCP_NODELAY) on upstream sockets.
    #[serde(default = "default_tcp_no_delay")]
    pub no_delay: bool,
    /// Upstream socket send buffer size (SO_SNDBUF). If 0, uses OS default.
    #[serde(default = "default_tcp_send_buffer")]
    pub send_buffer: usize,
    /// Upstream socket receive buffer size (SO_RCVBUF). If 0, uses OS default.
    #[serde(default = "default_tcp_recv_buffer")]
    pub recv_buffer: usize,
}

impl Default for TcpConfig {
    fn default() -> Self {
        Self {
            no_delay: default_tcp_no_delay(),
            send_buffer: default_tcp_send_buffer(),
            recv_buffer: default_tcp_recv_buffer(),
        }
    }
}

/// TLS termination. When absent the listener speaks plain HTTP and expects a
/// fronting proxy to handle TLS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Server certificate file path (PEM format).
    pub cert: String,
    /// Server private key file path (PEM format).
    pub key: String,
    /// ALPN protocols to advertise.
    #[serde(default)]
    pub alpn: Vec<String>,
    /// Minimum TLS version (tls12, tls13). Default: tls12
    #[serde(default = "default_min_tls_version")]
    pub min_version: String,
    /// Maximum TLS version (tls12, tls13). Default: tls13
    #[serde(default = "default_max_tls_version")]
    pub max_version: String,
    #[serde(default = "default_tls_handshake_timeout_secs")]
    pub handshake_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// The shared secret, e.g. `6cf627de-1a2b-4c3d-9e8f-706152433425`.
    #[serde(default)]
    pub uuid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrojanConfig {
    /// Where authenticated Trojan sessions are relayed, as `host:port`.
    #[serde(default = "default_trojan_target")]
    pub default_target: String,
}

impl Default for TrojanConfig {
    fn default() -> Self {
        Self {
            default_target: default_trojan_target(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebSocketConfig {
    /// Upgrade path. Defaults to `/` plus the first 8 characters of the uuid.
    #[serde(default)]
    pub path: Option<String>,
    /// Required `Host` header (optional).
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default = "default_ws_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            path: None,
            host: None,
            max_frame_bytes: default_ws_max_frame_bytes(),
        }
    }
}

/// Decoy page, subscription endpoint and node labelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Public domain advertised in subscription links. Falls back to the
    /// request `Host` header when unset.
    #[serde(default)]
    pub domain: Option<String>,
    /// Subscription path without the leading slash.
    #[serde(default = "default_sub_path")]
    pub sub_path: String,
    /// Node name prefix for the link fragment. May be empty.
    #[serde(default = "default_node_name")]
    pub name: String,
    /// Port advertised in subscription links.
    #[serde(default = "default_public_port")]
    pub public_port: u16,
    /// HTML served on `/`.
    #[serde(default)]
    pub index_file: Option<String>,
    /// Look up country and ISP at startup for the node label.
    #[serde(default = "default_true")]
    pub geoip_enabled: bool,
    #[serde(default = "default_geoip_url")]
    pub geoip_url: String,
    #[serde(default = "default_geoip_timeout_ms")]
    pub geoip_timeout_ms: u64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            domain: None,
            sub_path: default_sub_path(),
            name: default_node_name(),
            public_port: default_public_port(),
            index_file: None,
            geoip_enabled: default_true(),
            geoip_url: default_geoip_url(),
            geoip_timeout_ms: default_geoip_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetricsConfig {
    pub listen: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: Option<String>,
    /// Log format: json, pretty, or compact. Default: pretty.
    pub format: Option<String>,
    /// Output target: stdout or stderr. Default: stderr.
    pub output: Option<String>,
    /// Per-module log level filters (e.g., {"veil_dns": "debug", "rustls": "warn"}).
    #[serde(default)]
    pub filters: HashMap<String, String>,
}
