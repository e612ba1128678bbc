//! Outbound TCP connections to session targets.

use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::debug;
use veil_metrics::record_upstream_connect_duration;

use crate::util::connect_with_buffers;

/// Opens the upstream leg of a session.
#[async_trait]
pub trait Connect: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, target: SocketAddr) -> std::io::Result<Self::Stream>;
}

/// Plain TCP with a connect timeout and the configured socket options.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub timeout: Duration,
    pub no_delay: bool,
    pub send_buffer: usize,
    pub recv_buffer: usize,
}

impl TcpConnector {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            no_delay: veil_core::DEFAULT_TCP_NO_DELAY,
            send_buffer: veil_core::DEFAULT_TCP_SEND_BUFFER,
            recv_buffer: veil_core::DEFAULT_TCP_RECV_BUFFER,
        }
    }
}

#[async_trait]
impl Connect for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, target: SocketAddr) -> std::io::Result<TcpStream> {
        let start = Instant::now();
        let stream = tokio::time::timeout(
            self.timeout,
            connect_with_buffers(target, self.send_buffer, self.recv_buffer),
        )
        .await
        .map_err(|_| {
            std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("connect to {target} timed out"),
            )
        })??;
        record_upstream_connect_duration(start.elapsed().as_secs_f64());
        if self.no_delay {
            stream.set_nodelay(true)?;
        }
        debug!(target = %target, elapsed_ms = start.elapsed().as_millis() as u64, "upstream connected");
        Ok(stream)
    }
}
