//! Core types and constants shared across veil crates.
//!
//! This crate provides:
//! - Default configuration values
//! - Error type constants for metrics/logging
//! - The relay pump and its idempotent teardown
//! - The WebSocket byte-stream adapter

pub mod defaults;
pub mod errors;
pub mod io;
pub mod transport;

// Re-export commonly used items at crate root
pub use defaults::*;
pub use errors::*;

/// Project name.
pub const PROJECT_NAME: &str = "veil";
/// Project version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
