//! In-memory authentication backend.

use async_trait::async_trait;

use crate::credential::Credential;
use crate::error::AuthError;
use crate::hash::constant_time_eq;
use crate::traits::AuthBackend;

/// Backend holding the single configured credential.
///
/// Both checks compare every byte regardless of where the first mismatch is.
#[derive(Debug, Clone)]
pub struct MemoryAuth {
    credential: Credential,
}

impl MemoryAuth {
    #[inline]
    pub fn new(credential: Credential) -> Self {
        Self { credential }
    }

    /// Parse `uuid` and build a backend for it.
    pub fn from_uuid(uuid: &str) -> Result<Self, AuthError> {
        Credential::parse(uuid).map(Self::new)
    }

    #[inline]
    pub fn credential(&self) -> &Credential {
        &self.credential
    }
}

#[async_trait]
impl AuthBackend for MemoryAuth {
    async fn verify_vless(&self, uuid: &[u8]) -> Result<(), AuthError> {
        if constant_time_eq(uuid, self.credential.uuid_bytes()) {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }

    async fn verify_trojan(&self, hash: &[u8]) -> Result<(), AuthError> {
        if constant_time_eq(hash, self.credential.trojan_hash()) {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }
}
