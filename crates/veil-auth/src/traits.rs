//! Authentication backend trait.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::AuthError;

/// Trait for authentication backends.
///
/// Implementations must be thread-safe (`Send + Sync`) as they may be
/// called concurrently from multiple connections.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    /// Verify the 16-byte credential from a Vless header.
    async fn verify_vless(&self, uuid: &[u8]) -> Result<(), AuthError>;

    /// Verify the 56-byte hex password hash from a Trojan header.
    async fn verify_trojan(&self, hash: &[u8]) -> Result<(), AuthError>;
}

/// Blanket implementation for `Arc<A>` where `A: AuthBackend`.
#[async_trait]
impl<A: AuthBackend + ?Sized> AuthBackend for Arc<A> {
    #[inline]
    async fn verify_vless(&self, uuid: &[u8]) -> Result<(), AuthError> {
        (**self).verify_vless(uuid).await
    }

    #[inline]
    async fn verify_trojan(&self, hash: &[u8]) -> Result<(), AuthError> {
        (**self).verify_trojan(hash).await
    }
}

/// Blanket implementation for `Box<A>` where `A: AuthBackend`.
#[async_trait]
impl<A: AuthBackend + ?Sized> AuthBackend for Box<A> {
    #[inline]
    async fn verify_vless(&self, uuid: &[u8]) -> Result<(), AuthError> {
        (**self).verify_vless(uuid).await
    }

    #[inline]
    async fn verify_trojan(&self, hash: &[u8]) -> Result<(), AuthError> {
        (**self).verify_trojan(hash).await
    }
}
