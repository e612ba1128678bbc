//! Address resolution for veil.
//!
//! Literal addresses are used as-is; domains are resolved to one IPv4 address
//! through a DNS-over-HTTPS JSON endpoint (the `application/dns-json` format
//! served by Google and Cloudflare).
//!
//! # Usage
//!
//! ```rust,no_run
//! use veil_dns::{DnsConfig, DohResolver, Resolver};
//!
//! # async fn example() -> Result<(), veil_dns::DnsError> {
//! let resolver = DohResolver::new(&DnsConfig::default())?;
//!
//! let addr = resolver.resolve("example.com:443").await?;
//! println!("resolved: {addr}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod resolver;

pub use config::DnsConfig;
pub use error::DnsError;
pub use resolver::{DohResolver, Resolver, literal_ip, split_host_port};
