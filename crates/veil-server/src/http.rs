//! Minimal HTTP/1.1 request inspection and routing.
//!
//! The listener only ever needs the request line and a handful of headers:
//! enough to tell a WebSocket upgrade on the tunnel path from a visit to the
//! decoy page or the subscription endpoint.

use tokio::io::{AsyncWrite, AsyncWriteExt};

const HTTP_HEADER_END: &[u8] = b"\r\n\r\n";

/// The parts of a request head the router looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead<'a> {
    pub method: &'a str,
    /// Request target as sent, including any query string.
    pub target: &'a str,
    pub host: Option<&'a str>,
    /// `Upgrade: websocket`, `Connection: upgrade` and a key are all present.
    pub websocket: bool,
    /// Bytes up to and including the blank line.
    pub head_len: usize,
}

impl RequestHead<'_> {
    /// The target without its query string.
    pub fn path(&self) -> &str {
        self.target.split('?').next().unwrap_or("")
    }
}

/// Result of inspecting the bytes buffered so far.
#[derive(Debug, PartialEq, Eq)]
pub enum Inspect<'a> {
    /// The head is not complete yet.
    NeedMore,
    /// The bytes are not an HTTP/1.x request.
    NotHttp,
    Request(RequestHead<'a>),
}

pub fn inspect_request(buf: &[u8]) -> Inspect<'_> {
    let Some(head_len) = find_header_end(buf) else {
        if !looks_like_request_prefix(buf) {
            return Inspect::NotHttp;
        }
        return Inspect::NeedMore;
    };
    let Ok(head) = std::str::from_utf8(&buf[..head_len]) else {
        return Inspect::NotHttp;
    };
    let mut lines = head.split("\r\n");
    let Some(request_line) = lines.next() else {
        return Inspect::NotHttp;
    };
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("");
    let target = parts.next().unwrap_or("");
    let version = parts.next().unwrap_or("");
    if !version.starts_with("HTTP/1.") || method.is_empty() || !target.starts_with('/') {
        return Inspect::NotHttp;
    }

    let mut upgrade = false;
    let mut connection_upgrade = false;
    let mut ws_key = false;
    let mut host = None;

    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            let value = value.trim();
            let name = name.trim();
            if name.eq_ignore_ascii_case("upgrade") {
                upgrade |= value.to_ascii_lowercase().contains("websocket");
            } else if name.eq_ignore_ascii_case("connection") {
                connection_upgrade |= value.to_ascii_lowercase().contains("upgrade");
            } else if name.eq_ignore_ascii_case("sec-websocket-key") {
                ws_key |= !value.is_empty();
            } else if name.eq_ignore_ascii_case("host") {
                host = Some(value);
            }
        }
    }

    Inspect::Request(RequestHead {
        method,
        target,
        host,
        websocket: method == "GET" && upgrade && connection_upgrade && ws_key,
        head_len,
    })
}

/// Where a request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// WebSocket upgrade on the tunnel path.
    Upgrade,
    /// Upgrade on the tunnel path from an unexpected `Host`.
    Reject(&'static str),
    Decoy,
    Subscription,
    NotFound,
}

impl Route {
    /// Label for metrics.
    pub fn as_str(self) -> &'static str {
        match self {
            Route::Upgrade => "upgrade",
            Route::Reject(_) => "reject",
            Route::Decoy => "decoy",
            Route::Subscription => "subscription",
            Route::NotFound => "not_found",
        }
    }
}

/// Paths the router knows about, each with its leading slash.
#[derive(Debug, Clone)]
pub struct Routes {
    pub ws_path: String,
    pub ws_host: Option<String>,
    pub sub_path: String,
}

impl Routes {
    pub fn route(&self, head: &RequestHead<'_>) -> Route {
        if head.websocket && head.path() == self.ws_path {
            if !self.host_matches(head.host) {
                return Route::Reject("websocket host mismatch");
            }
            return Route::Upgrade;
        }
        if head.method != "GET" {
            return Route::NotFound;
        }
        if head.target == "/" {
            Route::Decoy
        } else if head.target == self.sub_path {
            Route::Subscription
        } else {
            Route::NotFound
        }
    }

    fn host_matches(&self, host: Option<&str>) -> bool {
        let Some(expected) = self.ws_host.as_deref() else {
            return true;
        };
        let Some(host) = host else {
            return false;
        };
        let host_only = host.split(':').next().unwrap_or("");
        host_only.eq_ignore_ascii_case(expected)
    }
}

/// Write a complete response and ask the client to close.
pub async fn write_response<S>(
    stream: &mut S,
    status: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> std::io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    let mut head = format!("HTTP/1.1 {status}\r\n");
    if let Some(ct) = content_type {
        head.push_str("Content-Type: ");
        head.push_str(ct);
        head.push_str("\r\n");
    }
    head.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    ));
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(HTTP_HEADER_END.len())
        .position(|w| w == HTTP_HEADER_END)
        .map(|idx| idx + HTTP_HEADER_END.len())
}

/// Cheap early rejection of binary garbage before the head completes.
fn looks_like_request_prefix(buf: &[u8]) -> bool {
    let token_end = buf.iter().position(|&b| b == b' ').unwrap_or(buf.len());
    token_end <= 16 && buf[..token_end].iter().all(|b| b.is_ascii_uppercase())
}
