//! WebSocket upgrade and first-frame handling.
//!
//! The `WsIo` adapter used for the relay lives in `veil-core::transport`.

use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::{
    WebSocketStream, accept_hdr_async_with_config,
    tungstenite::{
        Message,
        handshake::server::{Request, Response},
        protocol::WebSocketConfig,
    },
};
use tracing::trace;
use veil_core::io::PrefixedStream;

use crate::error::SessionError;

pub use veil_core::transport::WsIo;

/// Complete the upgrade on a stream whose request head was already read
/// into `initial`.
pub async fn accept_ws<S>(
    stream: S,
    initial: Bytes,
    max_frame_bytes: usize,
) -> Result<WebSocketStream<PrefixedStream<S>>, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let max_frame = (max_frame_bytes > 0).then_some(max_frame_bytes);
    let mut ws_cfg = WebSocketConfig::default();
    ws_cfg.max_frame_size = max_frame;
    ws_cfg.max_message_size = max_frame;
    let prefixed = PrefixedStream::new(initial, stream);
    accept_hdr_async_with_config(
        prefixed,
        |req: &Request, resp: Response| {
            trace!(path = %req.uri().path(), "websocket upgrade");
            Ok(resp)
        },
        Some(ws_cfg),
    )
    .await
    .map_err(|e| SessionError::Handshake(format!("websocket upgrade failed: {e}")))
}

/// Wait for the first data message, which carries the protocol header.
///
/// Control frames and empty messages are skipped. The wait is bounded by
/// `timeout`; a close or end of stream before any data is a handshake error.
pub async fn read_first_frame<S>(
    ws: &mut WebSocketStream<S>,
    timeout: Duration,
) -> Result<Bytes, SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let read = async {
        while let Some(msg) = ws.next().await {
            let data = match msg {
                Ok(Message::Binary(data)) => data,
                Ok(Message::Text(text)) => Bytes::from(text),
                Ok(Message::Close(_)) => break,
                Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_)) => continue,
                Err(e) => return Err(SessionError::Handshake(format!("websocket read: {e}"))),
            };
            if !data.is_empty() {
                return Ok(data);
            }
        }
        Err(SessionError::Handshake("closed before first frame".into()))
    };
    tokio::time::timeout(timeout, read)
        .await
        .map_err(|_| SessionError::Handshake("timed out waiting for first frame".into()))?
}
