//! Hostname resolvers.

use async_trait::async_trait;
use std::{net::IpAddr, sync::Arc};

pub mod fixed;

#[cfg(feature = "system")]
pub mod system;

#[cfg(feature = "hickory")]
pub mod hickory;

/// Represents the ability to resolve a hostname to a numeric address.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Errors encountered during resolution.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Resolves `host` to a single address. Literal addresses resolve to
    /// themselves.
    async fn lookup_host(&self, host: &str) -> Result<IpAddr, Self::Error>;
}

#[async_trait]
impl<R: HostResolver + ?Sized> HostResolver for Arc<R> {
    type Error = R::Error;

    async fn lookup_host(&self, host: &str) -> Result<IpAddr, Self::Error> {
        (**self).lookup_host(host).await
    }
}

/// Parses `host` as a literal IPv4 or IPv6 address.
pub(crate) fn literal_addr(host: &str) -> Option<IpAddr> {
    host.parse().ok()
}

/// Picks the first IPv4 address, falling back to the first address of any family.
pub(crate) fn preferred_addr(addrs: impl IntoIterator<Item = IpAddr>) -> Option<IpAddr> {
    let mut first = None;
    for addr in addrs {
        if addr.is_ipv4() {
            return Some(addr);
        }
        first = first.or(Some(addr));
    }
    first
}

#[test]
fn preferred_addr_prefers_ipv4() {
    use std::net::{Ipv4Addr, Ipv6Addr};
    let v4 = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1));
    let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
    assert_eq!(preferred_addr(vec![v6, v4]), Some(v4));
    assert_eq!(preferred_addr(vec![v6]), Some(v6));
    assert_eq!(preferred_addr(Vec::new()), None);
}
