//! veil server library.
//!
//! Accepts HTTP/1.1 (optionally over TLS), serves the decoy page and the
//! subscription endpoint, and turns WebSocket upgrades on the tunnel path into
//! Vless or Trojan sessions relayed to their targets.

pub mod cli;
mod connector;
mod error;
mod handler;
pub mod http;
mod resolve;
mod server;
pub mod session;
pub mod site;
mod state;
mod tls;
mod util;
pub mod ws;

pub use cli::ServerArgs;
pub use connector::{Connect, TcpConnector};
pub use error::{ServerError, SessionError};
pub use resolve::{resolve_address, resolve_target};
pub use server::{run, run_with_shutdown};
pub use session::{Session, SessionEnv, SessionState, VLESS_ACK};
pub use state::ServerState;
pub use tokio_util::sync::CancellationToken;
pub use util::{ConnectionGuard, ConnectionTracker};
