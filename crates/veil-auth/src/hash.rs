//! Hashing and comparison helpers.

use sha2::{Digest, Sha224};
use subtle::ConstantTimeEq;

/// Compute SHA224 hash and return as lowercase hex string.
///
/// This is the password hash carried at the start of a Trojan request.
///
/// # Example
/// ```
/// use veil_auth::sha224_hex;
///
/// let hash = sha224_hex("password123");
/// assert_eq!(hash.len(), 56);
/// ```
#[inline]
pub fn sha224_hex(input: &str) -> String {
    let mut hasher = Sha224::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two byte strings without an early exit on the first difference.
///
/// Slices of different length compare unequal.
#[inline]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
