//! Server and session error types.

use veil_dns::DnsError;
use veil_metrics::{
    ERROR_AUTH, ERROR_CONFIG, ERROR_CONNECT, ERROR_HANDSHAKE, ERROR_IO, ERROR_PROTOCOL,
    ERROR_RESOLVE, ERROR_TIMEOUT, ERROR_TLS_HANDSHAKE,
};
use veil_proto::ParseError;

/// Errors that stop the server itself (startup and accept loop).
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("tls: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),
    #[error("config: {0}")]
    Config(String),
    #[error("dns: {0}")]
    Dns(#[from] DnsError),
}

impl ServerError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            ServerError::Io(_) => ERROR_IO,
            ServerError::Tls(_) => ERROR_TLS_HANDSHAKE,
            ServerError::Config(_) | ServerError::Dns(_) => ERROR_CONFIG,
        }
    }
}

/// Why a tunnel session ended early.
///
/// None of these reach the client as data; the connection is simply closed.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// WebSocket upgrade failed, or no first frame arrived in time.
    #[error("handshake: {0}")]
    Handshake(String),
    #[error("malformed header: {0}")]
    HeaderMalformed(#[from] ParseError),
    #[error("credential mismatch")]
    AuthMismatch,
    #[error("resolve failed: {0}")]
    ResolveFailure(#[from] DnsError),
    #[error("upstream connect failed: {0}")]
    ConnectFailure(#[source] std::io::Error),
    /// The client hung up while the upstream was still being prepared.
    #[error("client closed before the upstream was ready")]
    ClientClosed,
    #[error("relay: {0}")]
    Relay(#[source] std::io::Error),
}

impl SessionError {
    /// Get the error type string for metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            SessionError::Handshake(_) => ERROR_HANDSHAKE,
            SessionError::HeaderMalformed(_) => ERROR_PROTOCOL,
            SessionError::AuthMismatch => ERROR_AUTH,
            SessionError::ResolveFailure(DnsError::Timeout(_)) => ERROR_TIMEOUT,
            SessionError::ResolveFailure(_) => ERROR_RESOLVE,
            SessionError::ConnectFailure(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                ERROR_TIMEOUT
            }
            SessionError::ConnectFailure(_) => ERROR_CONNECT,
            SessionError::ClientClosed | SessionError::Relay(_) => ERROR_IO,
        }
    }
}
