//! Bidirectional relay pump.
//!
//! Each direction is driven as an independent poll-based state machine within
//! a single future, so back-pressure on one direction never stalls the other.
//! Every direction owns exactly one fixed-size buffer and only reads again
//! after the previous chunk was written and flushed, which keeps memory per
//! session bounded regardless of how fast either peer produces data.
//!
//! The pump ends on the first terminal event of either leg. Closing the legs
//! is left to the caller (see [`Teardown`](super::Teardown)), which keeps
//! ownership of both streams while the pump only borrows them.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant as TokioInstant;

/// Why the relay stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayEnd {
    /// The client leg reached end-of-stream.
    ClientClosed,
    /// The upstream leg reached end-of-stream.
    UpstreamClosed,
    /// Neither direction moved data within the idle timeout.
    IdleTimeout,
}

enum CopyState {
    Reading,
    Writing(usize, usize), // (pos, len)
    Flushing,
}

enum CopyPoll {
    /// A chunk was written and flushed.
    Flushed,
    /// The reader returned end-of-stream.
    Eof,
}

/// Poll-driven one-directional copy: read → write → flush.
fn poll_copy_direction<R, W>(
    cx: &mut Context<'_>,
    reader: &mut R,
    writer: &mut W,
    buf: &mut [u8],
    state: &mut CopyState,
) -> Poll<io::Result<CopyPoll>>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    loop {
        match state {
            CopyState::Reading => {
                let mut read_buf = ReadBuf::new(buf);
                match Pin::new(&mut *reader).poll_read(cx, &mut read_buf) {
                    Poll::Ready(Ok(())) => {
                        let n = read_buf.filled().len();
                        if n == 0 {
                            return Poll::Ready(Ok(CopyPoll::Eof));
                        }
                        *state = CopyState::Writing(0, n);
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            CopyState::Writing(pos, len) => {
                match Pin::new(&mut *writer).poll_write(cx, &buf[*pos..*len]) {
                    Poll::Ready(Ok(0)) => {
                        return Poll::Ready(Err(io::Error::from(io::ErrorKind::WriteZero)));
                    }
                    Poll::Ready(Ok(n)) => {
                        *pos += n;
                        if *pos >= *len {
                            *state = CopyState::Flushing;
                        }
                    }
                    Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                    Poll::Pending => return Poll::Pending,
                }
            }
            CopyState::Flushing => match Pin::new(&mut *writer).poll_flush(cx) {
                Poll::Ready(Ok(())) => {
                    *state = CopyState::Reading;
                    return Poll::Ready(Ok(CopyPoll::Flushed));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => return Poll::Pending,
            },
        }
    }
}

/// Copy bytes between `client` and `upstream` until either leg ends.
///
/// Bytes are forwarded verbatim; order within each direction is preserved.
/// Returns the terminal event, or the first I/O error seen on either leg.
/// The idle timer resets whenever either direction flushes a chunk.
pub async fn relay_bidirectional<A, B>(
    client: &mut A,
    upstream: &mut B,
    idle_timeout: Duration,
    buffer_size: usize,
) -> io::Result<RelayEnd>
where
    A: AsyncRead + AsyncWrite + Unpin + ?Sized,
    B: AsyncRead + AsyncWrite + Unpin + ?Sized,
{
    let mut buf_up = vec![0u8; buffer_size];
    let mut buf_down = vec![0u8; buffer_size];
    let mut state_up = CopyState::Reading;
    let mut state_down = CopyState::Reading;

    let idle_sleep = tokio::time::sleep(idle_timeout);
    tokio::pin!(idle_sleep);

    loop {
        // Both directions are polled in the same closure; each registers its
        // own waker so either can make progress independently.
        let step = std::future::poll_fn(|cx| {
            let mut activity = false;

            match poll_copy_direction(cx, &mut *client, &mut *upstream, &mut buf_up, &mut state_up)
            {
                Poll::Ready(Ok(CopyPoll::Flushed)) => activity = true,
                Poll::Ready(Ok(CopyPoll::Eof)) => {
                    return Poll::Ready(Ok(Some(RelayEnd::ClientClosed)));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }

            match poll_copy_direction(
                cx,
                &mut *upstream,
                &mut *client,
                &mut buf_down,
                &mut state_down,
            ) {
                Poll::Ready(Ok(CopyPoll::Flushed)) => activity = true,
                Poll::Ready(Ok(CopyPoll::Eof)) => {
                    return Poll::Ready(Ok(Some(RelayEnd::UpstreamClosed)));
                }
                Poll::Ready(Err(e)) => return Poll::Ready(Err(e)),
                Poll::Pending => {}
            }

            if activity {
                Poll::Ready(Ok(None))
            } else {
                Poll::Pending
            }
        });

        tokio::select! {
            result = step => {
                if let Some(end) = result? {
                    return Ok(end);
                }
                idle_sleep.as_mut().reset(TokioInstant::now() + idle_timeout);
            }
            _ = &mut idle_sleep => {
                return Ok(RelayEnd::IdleTimeout);
            }
        }
    }
}
