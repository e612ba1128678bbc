//! Server state shared across connections.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use veil_auth::AuthBackend;
use veil_config::Config;
use veil_dns::Resolver;

use crate::connector::TcpConnector;
use crate::http::Routes;
use crate::session::SessionEnv;
use crate::site::SiteInfo;

/// Immutable after startup apart from the session counter.
pub struct ServerState {
    pub auth: Arc<dyn AuthBackend>,
    pub resolver: Arc<dyn Resolver>,
    pub connector: TcpConnector,
    pub routes: Routes,
    pub site: SiteInfo,
    pub trojan_target: String,
    pub max_header_bytes: usize,
    pub handshake_timeout: Duration,
    pub tcp_idle_timeout: Duration,
    pub relay_buffer_size: usize,
    pub ws_max_frame_bytes: usize,
    next_session_id: AtomicU64,
}

impl ServerState {
    pub fn new(
        config: &Config,
        auth: Arc<dyn AuthBackend>,
        resolver: Arc<dyn Resolver>,
        isp: String,
    ) -> Self {
        let server = &config.server;
        let connector = TcpConnector {
            timeout: Duration::from_secs(server.connect_timeout_secs),
            no_delay: server.tcp.no_delay,
            send_buffer: server.tcp.send_buffer,
            recv_buffer: server.tcp.recv_buffer,
        };
        Self {
            auth,
            resolver,
            connector,
            routes: Routes {
                ws_path: config.ws_path(),
                ws_host: config.websocket.host.clone(),
                sub_path: config.sub_path(),
            },
            site: SiteInfo::from_config(config, isp),
            trojan_target: config.trojan.default_target.clone(),
            max_header_bytes: server.max_header_bytes,
            handshake_timeout: Duration::from_secs(server.handshake_timeout_secs),
            tcp_idle_timeout: Duration::from_secs(server.tcp_idle_timeout_secs),
            relay_buffer_size: server.relay_buffer_size,
            ws_max_frame_bytes: config.websocket.max_frame_bytes,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// A fresh id for an accepted stream.
    pub fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn session_env(&self) -> SessionEnv<'_, TcpConnector> {
        SessionEnv {
            auth: &*self.auth,
            resolver: &*self.resolver,
            connector: &self.connector,
            trojan_target: &self.trojan_target,
            idle_timeout: self.tcp_idle_timeout,
            relay_buffer_size: self.relay_buffer_size,
        }
    }
}
