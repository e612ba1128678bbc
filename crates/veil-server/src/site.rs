//! Decoy page, subscription links and the startup geo/ISP lookup.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use tracing::{debug, warn};
use veil_config::Config;
use veil_core::{DEFAULT_DECOY_BODY, DEFAULT_ISP_LABEL};

/// Everything the subscription builder needs. Built once at startup.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub uuid: String,
    /// Configured public domain; `None` means "use the request Host".
    pub domain: Option<String>,
    pub public_port: u16,
    /// WebSocket path with its leading slash.
    pub ws_path: String,
    pub name: String,
    /// `<country>-<isp>` label, or the fallback when the lookup failed.
    pub isp: String,
    pub index_file: Option<String>,
}

impl SiteInfo {
    pub fn from_config(config: &Config, isp: String) -> Self {
        Self {
            uuid: config.auth.uuid.clone(),
            domain: config.site.domain.clone().filter(|d| !d.is_empty()),
            public_port: config.site.public_port,
            ws_path: config.ws_path(),
            name: config.site.name.clone(),
            isp,
            index_file: config.site.index_file.clone(),
        }
    }

    /// Link fragment: `<name>-<isp>`, or just the ISP when the name is empty.
    pub fn node_label(&self) -> String {
        if self.name.is_empty() {
            self.isp.clone()
        } else {
            format!("{}-{}", self.name, self.isp)
        }
    }

    fn encoded_path(&self) -> String {
        let path = self.ws_path.trim_start_matches('/');
        format!("%2F{path}")
    }

    pub fn vless_uri(&self, domain: &str) -> String {
        format!(
            "vless://{uuid}@{domain}:{port}?encryption=none&security=tls&sni={domain}&fp=chrome&type=ws&host={domain}&path={path}#{label}",
            uuid = self.uuid,
            port = self.public_port,
            path = self.encoded_path(),
            label = self.node_label(),
        )
    }

    pub fn trojan_uri(&self, domain: &str) -> String {
        format!(
            "trojan://{uuid}@{domain}:{port}?security=tls&sni={domain}&fp=chrome&type=ws&host={domain}&path={path}#{label}",
            uuid = self.uuid,
            port = self.public_port,
            path = self.encoded_path(),
            label = self.node_label(),
        )
    }

    /// Base64 of both links joined by a newline, plus a trailing newline.
    ///
    /// `request_host` is the request's `Host` header and is only consulted
    /// when no domain is configured.
    pub fn subscription(&self, request_host: Option<&str>) -> String {
        let domain = self
            .domain
            .as_deref()
            .or_else(|| request_host.map(strip_port))
            .unwrap_or_default();
        let links = format!("{}\n{}", self.vless_uri(domain), self.trojan_uri(domain));
        let mut body = STANDARD.encode(links);
        body.push('\n');
        body
    }

    /// Contents of the index file, or the fallback body.
    pub async fn decoy_body(&self) -> String {
        match &self.index_file {
            Some(path) => match tokio::fs::read_to_string(path).await {
                Ok(content) => content,
                Err(err) => {
                    debug!(path = %path, error = %err, "index file unreadable, serving fallback");
                    DEFAULT_DECOY_BODY.to_string()
                }
            },
            None => DEFAULT_DECOY_BODY.to_string(),
        }
    }
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        return match host.find(']') {
            Some(end) => &host[..=end],
            None => host,
        };
    }
    host.split(':').next().unwrap_or(host)
}

#[derive(Debug, Deserialize)]
struct GeoInfo {
    country_code: String,
    isp: String,
}

/// Look up `<country_code>-<isp>` (spaces replaced by `_`).
///
/// Never fails: any error yields the fallback label.
pub async fn lookup_isp(url: &str, timeout: Duration) -> String {
    match fetch_geo(url, timeout).await {
        Ok(geo) => format!("{}-{}", geo.country_code, geo.isp).replace(' ', "_"),
        Err(err) => {
            warn!(url = %url, error = %err, "geo lookup failed, using fallback label");
            DEFAULT_ISP_LABEL.to_string()
        }
    }
}

async fn fetch_geo(url: &str, timeout: Duration) -> Result<GeoInfo, reqwest::Error> {
    reqwest::Client::new()
        .get(url)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .json::<GeoInfo>()
        .await
}
