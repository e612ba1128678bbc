//! Default configuration values.
//!
//! Centralized default constants for use across all crates.

// ============================================================================
// Listener Defaults
// ============================================================================

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "0.0.0.0:7860";
/// Default TCP listener backlog.
pub const DEFAULT_CONNECTION_BACKLOG: u32 = 1024;

// ============================================================================
// Timeout Defaults
// ============================================================================

/// Default relay idle timeout in seconds.
pub const DEFAULT_TCP_TIMEOUT_SECS: u64 = 600;
/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;
/// Default timeout for the HTTP request, the WebSocket upgrade and the first frame.
pub const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 10;
/// Default upstream TCP connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
/// Upper bound for closing one relay leg during teardown.
pub const DEFAULT_TEARDOWN_TIMEOUT_SECS: u64 = 5;

// ============================================================================
// Buffer/Size Defaults
// ============================================================================

/// Default maximum HTTP request header bytes before the upgrade.
pub const DEFAULT_MAX_HEADER_BYTES: usize = 8192;
/// Minimum accepted value for `max_header_bytes`.
pub const MIN_HEADER_BYTES: usize = 256;
/// Default relay buffer size per direction (32 KiB).
pub const DEFAULT_RELAY_BUFFER_SIZE: usize = 32768;
/// Default TCP socket send buffer size (0 = OS default).
pub const DEFAULT_TCP_SEND_BUFFER: usize = 0;
/// Default TCP socket receive buffer size (0 = OS default).
pub const DEFAULT_TCP_RECV_BUFFER: usize = 0;

// ============================================================================
// TCP Socket Defaults
// ============================================================================

/// Default TCP_NODELAY on upstream sockets.
pub const DEFAULT_TCP_NO_DELAY: bool = true;

// ============================================================================
// TLS Defaults
// ============================================================================

/// Default minimum TLS version.
pub const DEFAULT_TLS_MIN_VERSION: &str = "tls12";
/// Default maximum TLS version.
pub const DEFAULT_TLS_MAX_VERSION: &str = "tls13";
/// Default TLS handshake timeout in seconds.
pub const DEFAULT_TLS_HANDSHAKE_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// WebSocket Defaults
// ============================================================================

/// Default max WebSocket frame size.
pub const DEFAULT_WS_MAX_FRAME_BYTES: usize = 1 << 20;
/// Number of leading UUID characters used for the default WebSocket path.
pub const DEFAULT_WS_PATH_UUID_CHARS: usize = 8;

// ============================================================================
// Resolver Defaults
// ============================================================================

/// Default DNS-over-HTTPS JSON endpoint.
pub const DEFAULT_DOH_URL: &str = "https://dns.google/resolve";
/// Default DNS-over-HTTPS request timeout in milliseconds.
pub const DEFAULT_DOH_TIMEOUT_MS: u64 = 5000;

// ============================================================================
// Trojan Defaults
// ============================================================================

/// Default relay target for Trojan sessions.
pub const DEFAULT_TROJAN_TARGET: &str = "localhost:80";

// ============================================================================
// Site Defaults
// ============================================================================

/// Default subscription path (without leading slash).
pub const DEFAULT_SUB_PATH: &str = "sub";
/// Default node name used in subscription fragments.
pub const DEFAULT_NODE_NAME: &str = "veil-node";
/// Default public port advertised in subscription URIs.
pub const DEFAULT_PUBLIC_PORT: u16 = 443;
/// Default geo/ISP lookup endpoint.
pub const DEFAULT_GEOIP_URL: &str = "https://api.ip.sb/geoip";
/// Default geo lookup timeout in milliseconds.
pub const DEFAULT_GEOIP_TIMEOUT_MS: u64 = 5000;
/// ISP label used when the geo lookup fails.
pub const DEFAULT_ISP_LABEL: &str = "Cloud-Server";
/// Body served on `/` when no index file is configured or readable.
pub const DEFAULT_DECOY_BODY: &str = "Service Running";
