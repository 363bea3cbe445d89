//! Resolver backed by the system's `getaddrinfo`.

use super::{literal_addr, preferred_addr, HostResolver};
use async_trait::async_trait;
use std::net::{IpAddr, ToSocketAddrs};

/// Errors encountered by [`SystemResolver`].
#[derive(Debug, thiserror::Error)]
pub enum SystemResolverError {
    /// Name resolution failed.
    #[error("could not translate host name \"{host}\" to address: {source}")]
    Io {
        /// Host being resolved.
        host: String,
        /// Underlying lookup error.
        source: std::io::Error,
    },
    /// Name resolution succeeded without producing any address.
    #[error("no address associated with host name \"{0}\"")]
    NoAddress(String),
    /// The blocking lookup task panicked or was cancelled.
    #[error("lookup task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Resolver using blocking `getaddrinfo` calls on tokio's blocking thread pool,
/// so that slow lookups do not stall other tasks.
///
/// Must be used from within a tokio runtime.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemResolver;

impl SystemResolver {
    fn lookup_blocking(host: &str) -> Result<IpAddr, SystemResolverError> {
        let io_error = |source| SystemResolverError::Io {
            host: host.to_string(),
            source,
        };
        // The port is irrelevant; only the addresses are kept
        let addrs = (host, 0).to_socket_addrs().map_err(io_error)?;
        preferred_addr(addrs.map(|addr| addr.ip()))
            .ok_or_else(|| SystemResolverError::NoAddress(host.to_string()))
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    type Error = SystemResolverError;

    async fn lookup_host(&self, host: &str) -> Result<IpAddr, Self::Error> {
        if let Some(addr) = literal_addr(host) {
            return Ok(addr);
        }
        let host = host.to_string();
        tokio::task::spawn_blocking(move || Self::lookup_blocking(&host)).await?
    }
}
