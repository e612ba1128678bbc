//! The process-wide shared secret.

use std::fmt;

use crate::error::AuthError;
use crate::hash::sha224_hex;

/// Length of the binary UUID.
pub const UUID_LEN: usize = 16;
/// Length of the hex-encoded SHA-224 digest.
pub const HASH_HEX_LEN: usize = 56;

/// The configured UUID in the three forms the protocols need.
///
/// Built once at startup and shared read-only by all sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    raw: String,
    uuid: [u8; UUID_LEN],
    hash_hex: [u8; HASH_HEX_LEN],
}

impl Credential {
    /// Parse a UUID string. Dashes are ignored; exactly 32 hex digits must
    /// remain. The Trojan hash is taken over the string exactly as given.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        let compact: String = raw.chars().filter(|c| *c != '-').collect();
        let uuid: [u8; UUID_LEN] = hex::decode(&compact)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| AuthError::InvalidUuid(raw.to_string()))?;

        let mut hash_hex = [0u8; HASH_HEX_LEN];
        hash_hex.copy_from_slice(sha224_hex(raw).as_bytes());

        Ok(Self {
            raw: raw.to_string(),
            uuid,
            hash_hex,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[inline]
    pub fn uuid_bytes(&self) -> &[u8; UUID_LEN] {
        &self.uuid
    }

    /// Lowercase hex SHA-224 of the raw UUID string.
    #[inline]
    pub fn trojan_hash(&self) -> &[u8; HASH_HEX_LEN] {
        &self.hash_hex
    }
}

// Keep secrets out of debug output.
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential").finish_non_exhaustive()
    }
}
