//! Idempotent closing of the two relay legs.

use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::defaults::DEFAULT_TEARDOWN_TIMEOUT_SECS;

/// One side of a relay together with its closed flag.
///
/// `close` sends the close signal (TCP FIN, WebSocket close frame) at most
/// once. Later calls return `false` without touching the stream.
#[derive(Debug)]
pub struct Leg<S> {
    stream: S,
    closed: bool,
}

impl<S> Leg<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            closed: false,
        }
    }

    #[inline]
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.stream
    }
}

impl<S: AsyncWrite + Unpin> Leg<S> {
    /// Close the write side once. Errors from a peer that is already gone are
    /// swallowed, and a peer that stops reading cannot stall the caller past
    /// the teardown timeout.
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        let timeout = Duration::from_secs(DEFAULT_TEARDOWN_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, self.stream.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => trace!(error = %err, "close on leg failed"),
            Err(_) => trace!("close on leg timed out"),
        }
        true
    }
}

/// What a teardown call actually closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TeardownReport {
    pub client_closed: bool,
    pub upstream_closed: bool,
}

/// Owns the client leg for the whole session and the upstream leg once it
/// exists. Dropping it releases both sockets.
#[derive(Debug)]
pub struct Teardown<C, U> {
    client: Leg<C>,
    upstream: Option<Leg<U>>,
}

impl<C, U> Teardown<C, U> {
    pub fn new(client: C) -> Self {
        Self {
            client: Leg::new(client),
            upstream: None,
        }
    }

    /// Take exclusive ownership of the connected upstream socket.
    pub fn attach_upstream(&mut self, upstream: U) {
        self.upstream = Some(Leg::new(upstream));
    }

    /// The client stream, before an upstream is attached.
    pub fn client_mut(&mut self) -> &mut C {
        self.client.get_mut()
    }

    /// Both streams, for the relay pump.
    pub fn legs_mut(&mut self) -> Option<(&mut C, &mut U)> {
        let upstream = self.upstream.as_mut()?;
        Some((self.client.get_mut(), upstream.get_mut()))
    }
}

impl<C, U> Teardown<C, U>
where
    C: AsyncWrite + Unpin,
    U: AsyncWrite + Unpin,
{
    /// Destroy the upstream leg and close the client leg.
    ///
    /// Safe to call any number of times; only the first call per leg emits a
    /// close signal.
    pub async fn close_all(&mut self) -> TeardownReport {
        let upstream_closed = match self.upstream.as_mut() {
            Some(leg) => leg.close().await,
            None => false,
        };
        let client_closed = self.client.close().await;
        TeardownReport {
            client_closed,
            upstream_closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::task::{Context, Poll};

    /// Write sink that counts shutdown calls.
    #[derive(Clone, Default)]
    struct CountingSink {
        shutdowns: Arc<AtomicUsize>,
    }

    impl AsyncWrite for CountingSink {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &[u8],
        ) -> Poll<std::io::Result<usize>> {
            Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
            let prev = self.shutdowns.fetch_add(1, Ordering::SeqCst);
            if prev == 0 {
                Poll::Ready(Ok(()))
            } else {
                Poll::Ready(Err(std::io::Error::from(std::io::ErrorKind::NotConnected)))
            }
        }
    }

    #[tokio::test]
    async fn second_teardown_is_noop() {
        let client = CountingSink::default();
        let upstream = CountingSink::default();
        let (client_count, upstream_count) = (client.shutdowns.clone(), upstream.shutdowns.clone());

        let mut teardown = Teardown::new(client);
        teardown.attach_upstream(upstream);

        let first = teardown.close_all().await;
        assert!(first.client_closed && first.upstream_closed);

        let second = teardown.close_all().await;
        assert_eq!(second, TeardownReport::default());

        assert_eq!(client_count.load(Ordering::SeqCst), 1);
        assert_eq!(upstream_count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn teardown_without_upstream_closes_client_only() {
        let client = CountingSink::default();
        let count = client.shutdowns.clone();
        let mut teardown: Teardown<CountingSink, CountingSink> = Teardown::new(client);

        let report = teardown.close_all().await;
        assert!(report.client_closed);
        assert!(!report.upstream_closed);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn leg_close_tolerates_dead_peer() {
        let (peer, stream) = tokio::io::duplex(8);
        drop(peer);
        let mut leg = Leg::new(stream);
        assert!(leg.close().await);
        assert!(!leg.close().await);
    }
}
