//! DNS-over-HTTPS JSON resolver.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::debug;

use crate::config::DnsConfig;
use crate::error::DnsError;

/// DNS record type A.
const RECORD_TYPE_A: u16 = 1;
/// DNS response code NOERROR.
const RCODE_NOERROR: u32 = 0;

/// Resolves hostnames to addresses.
///
/// Only [`resolve_ipv4`](Resolver::resolve_ipv4) performs a network lookup;
/// the provided methods handle literals and `host:port` splitting.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Look up the first IPv4 address of `host`.
    async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, DnsError>;

    /// Resolve `host` with `port`, skipping the lookup for literals.
    async fn resolve_host(&self, host: &str, port: u16) -> Result<SocketAddr, DnsError> {
        if let Some(ip) = literal_ip(host) {
            return Ok(SocketAddr::new(ip, port));
        }
        let ip = self.resolve_ipv4(host).await?;
        Ok(SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// Resolve `"host:port"` to a `SocketAddr`.
    async fn resolve(&self, addr: &str) -> Result<SocketAddr, DnsError> {
        if let Ok(sa) = addr.parse::<SocketAddr>() {
            return Ok(sa);
        }
        let (host, port) = split_host_port(addr)?;
        self.resolve_host(host, port).await
    }
}

#[async_trait]
impl<R: Resolver + ?Sized> Resolver for Arc<R> {
    #[inline]
    async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, DnsError> {
        (**self).resolve_ipv4(host).await
    }
}

/// Addresses that never need a lookup: IP literals and `localhost`.
pub fn literal_ip(host: &str) -> Option<IpAddr> {
    if host.eq_ignore_ascii_case("localhost") {
        return Some(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    let bare = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    bare.parse().ok()
}

/// Split `"host:port"` into (host, port).
///
/// Handles IPv6 bracket notation: `"[::1]:443"` → `("::1", 443)`.
pub fn split_host_port(addr: &str) -> Result<(&str, u16), DnsError> {
    if let Some(rest) = addr.strip_prefix('[') {
        if let Some((host, port_str)) = rest.split_once("]:") {
            let port = port_str
                .parse::<u16>()
                .map_err(|_| DnsError::InvalidAddress(addr.to_string()))?;
            return Ok((host, port));
        }
        return Err(DnsError::InvalidAddress(addr.to_string()));
    }

    if let Some((host, port_str)) = addr.rsplit_once(':') {
        let port = port_str
            .parse::<u16>()
            .map_err(|_| DnsError::InvalidAddress(addr.to_string()))?;
        if host.is_empty() {
            return Err(DnsError::InvalidAddress(addr.to_string()));
        }
        Ok((host, port))
    } else {
        Err(DnsError::InvalidAddress(format!(
            "missing port in address: {addr}"
        )))
    }
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Status")]
    status: u32,
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// Resolver backed by a DoH JSON endpoint.
///
/// Cheaply cloneable; the underlying HTTP client pools connections.
#[derive(Debug, Clone)]
pub struct DohResolver {
    client: reqwest::Client,
    url: Arc<str>,
    timeout: Duration,
}

impl DohResolver {
    /// Build a resolver from configuration.
    ///
    /// Call once at startup and share via `Clone` or `Arc`.
    pub fn new(config: &DnsConfig) -> Result<Self, DnsError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DnsError::Config(e.to_string()))?;
        Ok(Self {
            client,
            url: Arc::from(config.doh_url.as_str()),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    async fn query(&self, host: &str) -> Result<DohResponse, DnsError> {
        let resp = self
            .client
            .get(&*self.url)
            .query(&[("name", host), ("type", "A")])
            .header(ACCEPT, "application/dns-json")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| classify_reqwest(host, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(DnsError::HttpStatus(status.as_u16()));
        }

        resp.json::<DohResponse>()
            .await
            .map_err(|e| classify_reqwest(host, e))
    }
}

#[async_trait]
impl Resolver for DohResolver {
    async fn resolve_ipv4(&self, host: &str) -> Result<Ipv4Addr, DnsError> {
        let response = self.query(host).await?;
        let ip = first_a_record(host, &response)?;
        debug!(host = %host, resolved = %ip, "dns resolved");
        Ok(ip)
    }
}

fn first_a_record(host: &str, response: &DohResponse) -> Result<Ipv4Addr, DnsError> {
    if response.status != RCODE_NOERROR {
        return Err(DnsError::Rcode {
            host: host.to_string(),
            status: response.status,
        });
    }
    response
        .answer
        .iter()
        .find(|a| a.record_type == RECORD_TYPE_A)
        .and_then(|a| a.data.parse::<Ipv4Addr>().ok())
        .ok_or_else(|| DnsError::NoRecord(host.to_string()))
}

fn classify_reqwest(host: &str, err: reqwest::Error) -> DnsError {
    if err.is_timeout() {
        DnsError::Timeout(host.to_string())
    } else if err.is_decode() {
        DnsError::Decode(err.to_string())
    } else {
        DnsError::Http(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    /// Minimal HTTP server answering every request with `status` and `body`.
    /// Request heads are forwarded on the returned channel.
    async fn mock_doh(status: u16, body: String) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                let Ok((mut stream, _)) = listener.accept().await else {
                    return;
                };
                let tx = tx.clone();
                let body = body.clone();
                tokio::spawn(async move {
                    let mut head = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                        let n = stream.read(&mut buf).await.unwrap();
                        if n == 0 {
                            return;
                        }
                        head.extend_from_slice(&buf[..n]);
                    }
                    let _ = tx.send(String::from_utf8_lossy(&head).into_owned());
                    let resp = format!(
                        "HTTP/1.1 {status} X\r\nContent-Type: application/dns-json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                        body.len()
                    );
                    let _ = stream.write_all(resp.as_bytes()).await;
                });
            }
        });
        (format!("http://{addr}/resolve"), rx)
    }

    /// Server that accepts connections and never responds.
    async fn silent_doh() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        format!("http://{addr}/resolve")
    }

    fn resolver(url: String, timeout_ms: u64) -> DohResolver {
        DohResolver::new(&DnsConfig {
            doh_url: url,
            timeout_ms,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn resolves_first_a_record() {
        let body = serde_json::json!({
            "Status": 0,
            "Answer": [
                {"name": "example.com.", "type": 5, "TTL": 60, "data": "alias.example.net."},
                {"name": "alias.example.net.", "type": 1, "TTL": 60, "data": "93.184.216.34"},
                {"name": "alias.example.net.", "type": 1, "TTL": 60, "data": "93.184.216.35"}
            ]
        })
        .to_string();
        let (url, mut requests) = mock_doh(200, body).await;

        let ip = resolver(url, 2000).resolve_ipv4("example.com").await.unwrap();
        assert_eq!(ip, Ipv4Addr::new(93, 184, 216, 34));

        let head = requests.recv().await.unwrap();
        assert!(head.starts_with("GET /resolve?name=example.com&type=A "), "{head}");
        assert!(head.to_ascii_lowercase().contains("accept: application/dns-json"));
    }

    #[tokio::test]
    async fn nonzero_status_fails() {
        let body = r#"{"Status": 3, "Answer": []}"#.to_string();
        let (url, _rx) = mock_doh(200, body).await;
        let err = resolver(url, 2000).resolve_ipv4("nx.example").await.unwrap_err();
        assert!(matches!(err, DnsError::Rcode { status: 3, .. }), "{err}");
    }

    #[tokio::test]
    async fn missing_or_empty_answer_fails() {
        for body in [r#"{"Status": 0}"#, r#"{"Status": 0, "Answer": []}"#] {
            let (url, _rx) = mock_doh(200, body.to_string()).await;
            let err = resolver(url, 2000).resolve_ipv4("example.com").await.unwrap_err();
            assert!(matches!(err, DnsError::NoRecord(_)), "{err}");
        }
    }

    #[tokio::test]
    async fn unparsable_record_data_fails() {
        let body = r#"{"Status": 0, "Answer": [{"type": 1, "data": "not-an-ip"}]}"#.to_string();
        let (url, _rx) = mock_doh(200, body).await;
        let err = resolver(url, 2000).resolve_ipv4("example.com").await.unwrap_err();
        assert!(matches!(err, DnsError::NoRecord(_)), "{err}");
    }

    #[tokio::test]
    async fn http_error_status_fails() {
        let (url, _rx) = mock_doh(503, String::new()).await;
        let err = resolver(url, 2000).resolve_ipv4("example.com").await.unwrap_err();
        assert!(matches!(err, DnsError::HttpStatus(503)), "{err}");
    }

    #[tokio::test]
    async fn garbage_body_fails() {
        let (url, _rx) = mock_doh(200, "<html>".to_string()).await;
        let err = resolver(url, 2000).resolve_ipv4("example.com").await.unwrap_err();
        assert!(matches!(err, DnsError::Decode(_)), "{err}");
    }

    #[tokio::test]
    async fn silent_endpoint_times_out() {
        let url = silent_doh().await;
        let start = std::time::Instant::now();
        let err = resolver(url, 200).resolve_ipv4("example.com").await.unwrap_err();
        assert!(matches!(err, DnsError::Timeout(_)), "{err}");
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    struct CountingResolver(AtomicUsize);

    #[async_trait]
    impl Resolver for CountingResolver {
        async fn resolve_ipv4(&self, _host: &str) -> Result<Ipv4Addr, DnsError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(Ipv4Addr::new(10, 9, 8, 7))
        }
    }

    #[tokio::test]
    async fn literals_skip_lookup() {
        let r = CountingResolver(AtomicUsize::new(0));
        assert_eq!(
            r.resolve_host("192.0.2.1", 80).await.unwrap(),
            "192.0.2.1:80".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            r.resolve("[::1]:443").await.unwrap(),
            "[::1]:443".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            r.resolve("localhost:80").await.unwrap(),
            "127.0.0.1:80".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(r.0.load(Ordering::SeqCst), 0);

        assert_eq!(
            r.resolve("example.com:443").await.unwrap(),
            "10.9.8.7:443".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(r.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn split_host_port_basic() {
        assert_eq!(split_host_port("example.com:443").unwrap(), ("example.com", 443));
        assert_eq!(split_host_port("[::1]:8080").unwrap(), ("::1", 8080));
        split_host_port("example.com").unwrap_err();
        split_host_port(":80").unwrap_err();
    }
}
