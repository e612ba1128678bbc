//! DNS-over-HTTPS resolver configuration.

use serde::{Deserialize, Serialize};
use veil_core::defaults::{DEFAULT_DOH_TIMEOUT_MS, DEFAULT_DOH_URL};

/// DNS resolver configuration.
///
/// Domains are resolved with a single JSON query against `doh_url`
/// (`?name=<host>&type=A`). There is no cache and no retry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct DnsConfig {
    /// JSON DoH endpoint, e.g. `https://dns.google/resolve`.
    #[serde(default = "default_doh_url")]
    pub doh_url: String,

    /// Upper bound for one query, including the response body.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            doh_url: default_doh_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_doh_url() -> String {
    DEFAULT_DOH_URL.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_DOH_TIMEOUT_MS
}
