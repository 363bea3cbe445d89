//! Host resolver backed by [`hickory_resolver`].

use super::{literal_addr, HostResolver};
use async_trait::async_trait;
use hickory_resolver::{name_server::ConnectionProvider, ResolveError, Resolver};
use std::net::IpAddr;

/// Errors encountered resolving hosts with [`hickory_resolver`].
#[derive(Debug, thiserror::Error)]
pub enum HickoryLookupError {
    /// Resolver errors.
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    /// The lookup produced no address.
    #[error("no address associated with host name \"{0}\"")]
    NoAddress(String),
}

#[async_trait]
impl<P> HostResolver for Resolver<P>
where
    P: ConnectionProvider,
{
    type Error = HickoryLookupError;

    async fn lookup_host(&self, host: &str) -> Result<IpAddr, Self::Error> {
        if let Some(addr) = literal_addr(host) {
            return Ok(addr);
        }
        let lookup = self.lookup_ip(host).await?;
        lookup
            .iter()
            .next()
            .ok_or_else(|| HickoryLookupError::NoAddress(host.to_string()))
    }
}
