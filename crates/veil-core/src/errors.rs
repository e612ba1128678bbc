//! Error type constants for metrics and logging.
//!
//! These constants provide consistent error classification across all crates.

/// TLS handshake error.
pub const ERROR_TLS_HANDSHAKE: &str = "tls_handshake";
/// WebSocket upgrade or first-frame error.
pub const ERROR_HANDSHAKE: &str = "handshake";
/// Malformed first frame.
pub const ERROR_PROTOCOL: &str = "protocol";
/// Credential mismatch.
pub const ERROR_AUTH: &str = "auth";
/// DNS/address resolution error.
pub const ERROR_RESOLVE: &str = "resolve";
/// Upstream connect error.
pub const ERROR_CONNECT: &str = "connect";
/// I/O error.
pub const ERROR_IO: &str = "io";
/// Timeout error.
pub const ERROR_TIMEOUT: &str = "timeout";
/// Configuration error.
pub const ERROR_CONFIG: &str = "config";
/// A session task panicked.
pub const ERROR_PANIC: &str = "panic";
