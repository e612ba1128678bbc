//! Authentication error types.

/// Authentication error.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// The presented credential does not match the configured secret.
    #[error("invalid credential")]
    Invalid,

    /// The configured secret is not a UUID.
    #[error("invalid uuid {0:?}: expected 32 hex digits, dashes allowed")]
    InvalidUuid(String),
}
