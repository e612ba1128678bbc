//! Transport adapters.

#[cfg(feature = "ws")]
mod ws;

#[cfg(feature = "ws")]
pub use ws::WsIo;
