//! Configuration validation logic.

use crate::Config;
use crate::defaults::min_header_bytes;
use crate::loader::ConfigError;

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.listen.trim().is_empty() {
        return Err(ConfigError::Validation("server.listen is empty".into()));
    }
    if config.auth.uuid.trim().is_empty() {
        return Err(ConfigError::Validation(
            "auth.uuid is required (set it in the config file or via UUID)".into(),
        ));
    }
    if let Err(e) = veil_auth::Credential::parse(&config.auth.uuid) {
        return Err(ConfigError::Validation(format!("auth.uuid: {e}")));
    }
    if config.server.tcp_idle_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.tcp_idle_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.handshake_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.handshake_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.connect_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "server.connect_timeout_secs must be > 0".into(),
        ));
    }
    if config.server.max_header_bytes < min_header_bytes() {
        return Err(ConfigError::Validation(format!(
            "server.max_header_bytes too small (min {})",
            min_header_bytes()
        )));
    }
    if config.server.relay_buffer_size < 1024 {
        return Err(ConfigError::Validation(
            "server.relay_buffer_size must be >= 1024".into(),
        ));
    }
    if config.server.relay_buffer_size > 1024 * 1024 {
        return Err(ConfigError::Validation(
            "server.relay_buffer_size must be <= 1MB".into(),
        ));
    }
    if config.server.connection_backlog == 0 {
        return Err(ConfigError::Validation(
            "server.connection_backlog must be > 0".into(),
        ));
    }
    if config.trojan.default_target.rsplit_once(':').is_none() {
        return Err(ConfigError::Validation(
            "trojan.default_target must be host:port".into(),
        ));
    }
    if let Some(tls) = &config.tls {
        if tls.cert.trim().is_empty() {
            return Err(ConfigError::Validation("tls.cert is empty".into()));
        }
        if tls.key.trim().is_empty() {
            return Err(ConfigError::Validation("tls.key is empty".into()));
        }
        let valid_versions = ["tls12", "tls13"];
        if !valid_versions.contains(&tls.min_version.as_str()) {
            return Err(ConfigError::Validation(format!(
                "tls.min_version must be one of: {:?}",
                valid_versions
            )));
        }
        if !valid_versions.contains(&tls.max_version.as_str()) {
            return Err(ConfigError::Validation(format!(
                "tls.max_version must be one of: {:?}",
                valid_versions
            )));
        }
        // "tls12" < "tls13" lexically
        if tls.min_version > tls.max_version {
            return Err(ConfigError::Validation(
                "tls.min_version cannot be greater than tls.max_version".into(),
            ));
        }
    }
    let ws_path = config.ws_path();
    if ws_path == "/" {
        return Err(ConfigError::Validation(
            "websocket.path must not be '/' (reserved for the decoy page)".into(),
        ));
    }
    let sub_path = config.sub_path();
    if sub_path == "/" || sub_path == ws_path {
        return Err(ConfigError::Validation(
            "site.sub_path must differ from '/' and websocket.path".into(),
        ));
    }
    if config.websocket.max_frame_bytes == 0 {
        return Err(ConfigError::Validation(
            "websocket.max_frame_bytes must be > 0".into(),
        ));
    }
    if !config.dns.doh_url.starts_with("https://") && !config.dns.doh_url.starts_with("http://")
    {
        return Err(ConfigError::Validation(
            "dns.doh_url must be an http(s) URL".into(),
        ));
    }
    if config.dns.timeout_ms == 0 {
        return Err(ConfigError::Validation("dns.timeout_ms must be > 0".into()));
    }
    Ok(())
}
