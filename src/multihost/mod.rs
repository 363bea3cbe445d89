//! Resolution of multi-host connection parameters.

use crate::{params::ConnParams, resolver::HostResolver, version::ProtocolVersion};
use futures_util::{
    stream::{self, FuturesUnordered, StreamExt},
    FutureExt,
};
use std::{fmt, net::IpAddr, sync::Arc};

mod outcome;
pub use outcome::{Outcome, Resolved, Skip};

mod plan;
use plan::Plan;

/// Errors that make connecting with the given parameters impossible.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Ports were given per host, but not for every host.
    #[error("cannot match {hosts} hosts with {ports} port numbers")]
    PortHostMismatch {
        /// Number of hosts.
        hosts: usize,
        /// Number of ports.
        ports: usize,
    },
    /// Every host failed to resolve. Holds the last lookup error.
    #[error("no host could be resolved: {0}")]
    NoHostResolved(String),
}

/// Execution mode to use when looking up several hosts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Lookups are performed *serially* (i.e. one after the other).
    #[default]
    Serial,
    /// Lookups are performed *concurrently* (i.e. all at once).
    /// Note that this does not imply parallelism--no additional tasks are
    /// spawned, though a resolver may offload its own work.
    Concurrent,
}

type VersionProbe = Arc<dyn Fn() -> ProtocolVersion + Send + Sync>;

/// Resolves the hosts of connection parameters to numeric addresses ahead of
/// connecting, so the connection attempt itself needs no name resolution.
///
/// Hosts failing to resolve are dropped, along with their port when ports
/// are given per host; resolution only fails if no host is left.
pub struct MultiHostResolver<Resolver> {
    resolver: Resolver,
    execution_mode: ExecutionMode,
    version_probe: Option<VersionProbe>,
}

impl<Resolver: HostResolver + Default> MultiHostResolver<Resolver> {
    /// Creates a new multi-host resolver using a default-constructed resolver.
    pub fn new() -> Self {
        Self::new_with_resolver(Resolver::default())
    }
}

impl<Resolver: HostResolver + Default> Default for MultiHostResolver<Resolver> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Resolver: HostResolver> MultiHostResolver<Resolver> {
    /// Creates a new multi-host resolver looking hosts up with `resolver`.
    pub fn new_with_resolver(resolver: Resolver) -> Self {
        Self {
            resolver,
            execution_mode: ExecutionMode::default(),
            version_probe: None,
        }
    }

    /// Gets the protocol library version, or `None` if no probe was
    /// configured, in which case `hostaddr` is assumed to be supported.
    pub fn protocol_version(&self) -> Option<ProtocolVersion> {
        self.version_probe.as_ref().map(|probe| probe())
    }

    /// Resolves the hosts in `params`, leaving `params` untouched.
    ///
    /// Returns [`Outcome::Skipped`] when `hostaddr` is already set, `host` is
    /// missing or names a local socket, or the protocol library is too old
    /// for `hostaddr`.
    pub async fn resolve(&self, params: &ConnParams) -> Result<Outcome, Error> {
        let targets = match Plan::new(params, self.protocol_version())? {
            Plan::Skip(skip) => {
                #[cfg(feature = "log")]
                tracing::debug!(reason = ?skip, "skipping hostaddr resolution");
                return Ok(Outcome::Skipped(skip));
            }
            Plan::Lookup(targets) => targets,
        };

        let slots = self.lookup_all(&targets.hosts).await;

        let mut resolved = Resolved::new(targets.ports.is_some());
        let mut last_error = None;
        for (idx, slot) in slots.into_iter().enumerate() {
            let host = targets.hosts[idx];
            match slot {
                Some(Ok(addr)) => {
                    #[cfg(feature = "log")]
                    tracing::debug!(host, addr = %addr, "host resolved");
                    resolved.push(host, addr, targets.port(idx));
                }
                Some(Err(err)) => {
                    #[cfg(feature = "log")]
                    tracing::warn!(host, error = %err, "host lookup failed, dropping host");
                    last_error = Some(err.to_string());
                }
                None => {}
            }
        }

        if resolved.is_empty() {
            return Err(Error::NoHostResolved(last_error.unwrap_or_default()));
        }
        Ok(Outcome::Resolved(resolved))
    }

    /// Resolves the hosts in `params` and rewrites `host`, `hostaddr` and
    /// `port` in place. On error, `params` is left unchanged.
    ///
    /// ```
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// use hostaddr_rs::{resolver::fixed::StaticResolver, ConnParams, MultiHostResolver};
    /// let resolver = StaticResolver::new().with_host("foo.com", [1, 1, 1, 1].into());
    /// let mut params = ConnParams::parse("host=foo.com,nosuchhost.com port=5432,5433")?;
    /// MultiHostResolver::new_with_resolver(resolver)
    ///     .resolve_in_place(&mut params)
    ///     .await?;
    /// assert_eq!(params.to_string(), "host=foo.com hostaddr=1.1.1.1 port=5432");
    /// # Ok(())
    /// # }
    /// ```
    pub async fn resolve_in_place(&self, params: &mut ConnParams) -> Result<(), Error> {
        let outcome = self.resolve(params).await?;
        outcome.apply(params);
        Ok(())
    }

    /// Looks up every host, returning one slot per host in input order.
    async fn lookup_all(&self, hosts: &[&str]) -> Vec<Option<Result<IpAddr, Resolver::Error>>> {
        let lookups = hosts.iter().enumerate().map(|(idx, &host)| {
            self.resolver
                .lookup_host(host)
                .map(move |result| (idx, result))
        });
        let results: Vec<_> = match self.execution_mode {
            ExecutionMode::Serial => stream::iter(lookups).then(|lookup| lookup).collect().await,
            ExecutionMode::Concurrent => {
                lookups
                    .collect::<FuturesUnordered<_>>()
                    .collect()
                    .await
            }
        };

        // Completion order is arbitrary in concurrent mode
        let mut slots: Vec<Option<Result<IpAddr, Resolver::Error>>> =
            hosts.iter().map(|_| None).collect();
        for (idx, result) in results {
            slots[idx] = Some(result);
        }
        slots
    }

    /// Sets the resolver used to look up hosts.
    pub fn resolver<R>(self, resolver: R) -> MultiHostResolver<R> {
        MultiHostResolver {
            resolver,
            execution_mode: self.execution_mode,
            version_probe: self.version_probe,
        }
    }

    /// Sets the execution mode used to look up several hosts.
    pub fn execution_mode(self, execution_mode: ExecutionMode) -> Self {
        Self {
            execution_mode,
            ..self
        }
    }

    /// Sets a fixed protocol library version.
    pub fn protocol_version_fixed(self, version: ProtocolVersion) -> Self {
        self.version_probe(move || version)
    }

    /// Sets a function queried for the protocol library version on every
    /// resolution.
    pub fn version_probe(
        self,
        probe: impl Fn() -> ProtocolVersion + Send + Sync + 'static,
    ) -> Self {
        Self {
            version_probe: Some(Arc::new(probe)),
            ..self
        }
    }
}

impl<Resolver: fmt::Debug> fmt::Debug for MultiHostResolver<Resolver> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiHostResolver")
            .field("resolver", &self.resolver)
            .field("execution_mode", &self.execution_mode)
            .field("version_probe", &self.version_probe.is_some())
            .finish()
    }
}
