//! Address resolution for session targets.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use tokio::time::Instant;
use veil_dns::{DnsError, Resolver};
use veil_metrics::record_dns_resolve_duration;
use veil_proto::{AddressRef, HostRef};

/// Resolve a header address to a `SocketAddr`.
///
/// IP literals are used unchanged, as is a domain field that holds a
/// dotted-quad IPv4 address. Every other domain, `localhost` included, costs
/// exactly one A lookup.
#[inline]
pub async fn resolve_address<R>(
    address: &AddressRef<'_>,
    resolver: &R,
) -> Result<SocketAddr, DnsError>
where
    R: Resolver + ?Sized,
{
    match address.host {
        HostRef::Ipv4(ip) => Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::from(ip)), address.port)),
        HostRef::Ipv6(ip) => Ok(SocketAddr::new(IpAddr::V6(Ipv6Addr::from(ip)), address.port)),
        HostRef::Domain(domain) => {
            if let Ok(ip) = domain.parse::<Ipv4Addr>() {
                return Ok(SocketAddr::new(IpAddr::V4(ip), address.port));
            }
            let start = Instant::now();
            let result = resolver.resolve_ipv4(domain).await;
            record_dns_resolve_duration(start.elapsed().as_secs_f64());
            Ok(SocketAddr::new(IpAddr::V4(result?), address.port))
        }
    }
}

/// Resolve a configured `host:port` string, such as the Trojan target.
///
/// Operator-supplied, so IP literals and `localhost` skip the lookup.
pub async fn resolve_target<R>(target: &str, resolver: &R) -> Result<SocketAddr, DnsError>
where
    R: Resolver + ?Sized,
{
    let start = Instant::now();
    let result = resolver.resolve(target).await;
    record_dns_resolve_duration(start.elapsed().as_secs_f64());
    result
}
