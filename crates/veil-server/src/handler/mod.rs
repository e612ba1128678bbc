//! Per-connection handling: HTTP routing, then a tunnel session on upgrade.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;
use veil_metrics::record_http_request;

use crate::error::SessionError;
use crate::http::{Inspect, Route, inspect_request, write_response};
use crate::session::Session;
use crate::state::ServerState;
use crate::ws::{WsIo, accept_ws, read_first_frame};

/// Initial buffer size for reading the request head.
pub const INITIAL_BUFFER_SIZE: usize = 2048;

enum HeadRead {
    Complete(BytesMut),
    NotHttp,
    TooLarge,
    Closed,
}

/// Handle a new connection after the optional TLS handshake.
pub async fn handle_conn<S>(
    mut stream: S,
    state: Arc<ServerState>,
    peer: SocketAddr,
    session_id: u64,
) -> Result<(), SessionError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let head = tokio::time::timeout(
        state.handshake_timeout,
        read_head(&mut stream, state.max_header_bytes),
    )
    .await
    .map_err(|_| SessionError::Handshake("timed out reading request".into()))?
    .map_err(|e| SessionError::Handshake(format!("reading request: {e}")))?;

    let buf = match head {
        HeadRead::Complete(buf) => buf,
        HeadRead::NotHttp => {
            debug!(peer = %peer, session = session_id, "not http, closing");
            return Ok(());
        }
        HeadRead::TooLarge => {
            debug!(peer = %peer, session = session_id, "request head too large, closing");
            return Ok(());
        }
        HeadRead::Closed => return Ok(()),
    };

    let (route, host) = match inspect_request(&buf) {
        Inspect::Request(head) => (state.routes.route(&head), head.host.map(str::to_owned)),
        Inspect::NeedMore | Inspect::NotHttp => return Ok(()),
    };
    record_http_request(route.as_str());
    debug!(peer = %peer, session = session_id, route = route.as_str(), "http request");

    let response = match route {
        Route::Upgrade => {
            let mut ws = tokio::time::timeout(
                state.handshake_timeout,
                accept_ws(stream, buf.freeze(), state.ws_max_frame_bytes),
            )
            .await
            .map_err(|_| SessionError::Handshake("websocket upgrade timed out".into()))??;
            let frame = read_first_frame(&mut ws, state.handshake_timeout).await?;
            let mut session = Session::new(session_id, peer);
            let env = state.session_env();
            session.run(&env, WsIo::new(ws), &frame).await?;
            return Ok(());
        }
        Route::Decoy => {
            let body = state.site.decoy_body().await;
            write_response(
                &mut stream,
                "200 OK",
                Some("text/html; charset=utf-8"),
                body.as_bytes(),
            )
            .await
        }
        Route::Subscription => {
            let body = state.site.subscription(host.as_deref());
            write_response(
                &mut stream,
                "200 OK",
                Some("text/plain; charset=utf-8"),
                body.as_bytes(),
            )
            .await
        }
        Route::NotFound => write_response(&mut stream, "404 Not Found", None, b"").await,
        Route::Reject(reason) => {
            debug!(peer = %peer, reason, "websocket rejected");
            write_response(&mut stream, "400 Bad Request", None, b"").await
        }
    };
    response.map_err(SessionError::Relay)?;
    let _ = stream.shutdown().await;
    Ok(())
}

async fn read_head<S>(stream: &mut S, max_header_bytes: usize) -> std::io::Result<HeadRead>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(INITIAL_BUFFER_SIZE.min(max_header_bytes));
    loop {
        match inspect_request(&buf) {
            Inspect::Request(_) => return Ok(HeadRead::Complete(buf)),
            Inspect::NotHttp => return Ok(HeadRead::NotHttp),
            Inspect::NeedMore => {}
        }
        if buf.len() >= max_header_bytes {
            return Ok(HeadRead::TooLarge);
        }
        if stream.read_buf(&mut buf).await? == 0 {
            return Ok(HeadRead::Closed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_auth::MemoryAuth;
    use veil_config::Config;
    use veil_dns::{DnsConfig, DohResolver};

    const UUID: &str = "6cf627de-1a2b-4c3d-9e8f-706152433425";

    fn state() -> Arc<ServerState> {
        let mut config = Config::default();
        config.auth.uuid = UUID.into();
        config.site.domain = Some("node.example.com".into());
        let auth = Arc::new(MemoryAuth::from_uuid(UUID).unwrap());
        let resolver = Arc::new(DohResolver::new(&DnsConfig::default()).unwrap());
        Arc::new(ServerState::new(&config, auth, resolver, "XX-Test".into()))
    }

    async fn exchange(request: &[u8]) -> Vec<u8> {
        let (mut client, server) = tokio::io::duplex(64 * 1024);
        let task = tokio::spawn(handle_conn(server, state(), "127.0.0.1:1".parse().unwrap(), 1));
        client.write_all(request).await.unwrap();
        let mut out = Vec::new();
        client.read_to_end(&mut out).await.unwrap();
        task.await.unwrap().unwrap();
        out
    }

    #[tokio::test]
    async fn root_serves_decoy() {
        let out = exchange(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").await;
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("text/html"));
        assert!(text.ends_with("Service Running"));
    }

    #[tokio::test]
    async fn sub_path_serves_subscription() {
        let out = exchange(b"GET /sub HTTP/1.1\r\nHost: x\r\n\r\n").await;
        let text = String::from_utf8(out).unwrap();
        let expected = state().site.subscription(None);
        assert!(text.contains("text/plain"));
        assert!(text.ends_with(&expected));
    }

    #[tokio::test]
    async fn unknown_path_is_404_with_empty_body() {
        let out = exchange(b"GET /nope HTTP/1.1\r\nHost: x\r\n\r\n").await;
        assert_eq!(
            out,
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn garbage_is_closed_without_reply() {
        let out = exchange(&[0x16, 0x03, 0x01, 0x02, 0x00]).await;
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn oversized_head_is_closed() {
        let mut request = b"GET /".to_vec();
        request.extend(std::iter::repeat_n(b'a', 9000));
        let out = exchange(&request).await;
        assert!(out.is_empty());
    }
}
