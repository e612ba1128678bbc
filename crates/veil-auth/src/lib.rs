//! Credential checks for veil sessions.
//!
//! A single UUID secret authenticates both protocols: Vless carries its 16
//! binary bytes, Trojan carries the lowercase hex SHA-224 of the UUID string.
//!
//! # Example
//!
//! ```
//! use veil_auth::{AuthBackend, MemoryAuth, sha224_hex};
//!
//! # async fn example() -> Result<(), veil_auth::AuthError> {
//! let uuid = "6cf627de-1a2b-4c3d-9e8f-706152433425";
//! let auth = MemoryAuth::from_uuid(uuid)?;
//!
//! auth.verify_trojan(sha224_hex(uuid).as_bytes()).await?;
//! # Ok(())
//! # }
//! ```

mod credential;
mod error;
mod hash;
mod memory;
mod traits;

pub use credential::{Credential, HASH_HEX_LEN, UUID_LEN};
pub use error::AuthError;
pub use hash::{constant_time_eq, sha224_hex};
pub use memory::MemoryAuth;
pub use traits::AuthBackend;
