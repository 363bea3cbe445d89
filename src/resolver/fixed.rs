//! Resolver backed by a fixed table of hosts.

use super::{literal_addr, HostResolver};
use async_trait::async_trait;
use std::{collections::HashMap, net::IpAddr};

/// Error produced by [`StaticResolver`] for names missing from its table.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("unknown host: {0}")]
pub struct UnknownHost(pub String);

/// Resolver answering from an in-memory `name -> address` table, like a
/// hosts file that never touches the network.
///
/// ```
/// # #[tokio::main]
/// # async fn main() {
/// use hostaddr_rs::resolver::{fixed::StaticResolver, HostResolver};
/// let resolver = StaticResolver::new().with_host("foo.com", [1, 1, 1, 1].into());
/// assert_eq!(resolver.lookup_host("foo.com").await.unwrap().to_string(), "1.1.1.1");
/// assert_eq!(resolver.lookup_host("2.2.2.2").await.unwrap().to_string(), "2.2.2.2");
/// assert!(resolver.lookup_host("qux.com").await.is_err());
/// # }
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, IpAddr>,
}

impl StaticResolver {
    /// Creates a resolver with an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a host to the table.
    pub fn with_host(mut self, name: impl Into<String>, addr: IpAddr) -> Self {
        self.insert(name, addr);
        self
    }

    /// Adds a host to the table, returning the address it previously had.
    pub fn insert(&mut self, name: impl Into<String>, addr: IpAddr) -> Option<IpAddr> {
        self.hosts.insert(name.into(), addr)
    }

    fn get(&self, host: &str) -> Result<IpAddr, UnknownHost> {
        literal_addr(host)
            .or_else(|| self.hosts.get(host).copied())
            .ok_or_else(|| UnknownHost(host.to_string()))
    }
}

impl<S: Into<String>> FromIterator<(S, IpAddr)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (S, IpAddr)>>(iter: I) -> Self {
        Self {
            hosts: iter
                .into_iter()
                .map(|(name, addr)| (name.into(), addr))
                .collect(),
        }
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    type Error = UnknownHost;

    async fn lookup_host(&self, host: &str) -> Result<IpAddr, Self::Error> {
        self.get(host)
    }
}
