//! I/O utilities for the relay pump and stream adapters.

mod prefixed;
mod relay;
mod teardown;

pub use prefixed::PrefixedStream;
pub use relay::{RelayEnd, relay_bidirectional};
pub use teardown::{Leg, Teardown, TeardownReport};
