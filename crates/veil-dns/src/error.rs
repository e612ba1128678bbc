//! DNS resolver errors.

/// Errors from DNS resolution.
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    /// The DoH query did not complete in time.
    #[error("dns query for {0} timed out")]
    Timeout(String),

    /// Transport-level failure talking to the DoH endpoint.
    #[error("dns query failed: {0}")]
    Http(#[source] reqwest::Error),

    /// The DoH endpoint answered with a non-2xx HTTP status.
    #[error("dns endpoint returned http {0}")]
    HttpStatus(u16),

    /// The response body was not the expected JSON.
    #[error("undecodable dns response: {0}")]
    Decode(String),

    /// The DNS response code was not NOERROR.
    #[error("dns lookup for {host} failed with status {status}")]
    Rcode { host: String, status: u32 },

    /// No usable A record in the answer section.
    #[error("no A record for {0}")]
    NoRecord(String),

    /// Invalid address format (missing port, bad IP, etc.).
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The resolver could not be constructed.
    #[error("invalid resolver configuration: {0}")]
    Config(String),
}
