use super::{Error, Skip};
use crate::{
    params::{ConnParams, HOST, HOSTADDR, PORT},
    version::ProtocolVersion,
};

/// What a resolution will do for a given set of parameters.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Plan<'a> {
    /// Leave the parameters alone.
    Skip(Skip),
    /// Look up these targets.
    Lookup(Targets<'a>),
}

/// Hosts to look up, with the port of each when ports are given per host.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Targets<'a> {
    pub(crate) hosts: Vec<&'a str>,
    /// `None` when a single port (or none) applies to every host.
    pub(crate) ports: Option<Vec<&'a str>>,
}

impl<'a> Targets<'a> {
    pub(crate) fn port(&self, idx: usize) -> Option<&'a str> {
        self.ports.as_ref().map(|ports| ports[idx])
    }
}

impl<'a> Plan<'a> {
    /// Applies the short-circuit rules in order, then splits and validates
    /// the host and port lists.
    pub(crate) fn new(
        params: &'a ConnParams,
        version: Option<ProtocolVersion>,
    ) -> Result<Self, Error> {
        if params.get_nonempty(HOSTADDR).is_some() {
            return Ok(Plan::Skip(Skip::HostaddrPresent));
        }
        let host = match params.get_nonempty(HOST) {
            Some(host) => host,
            None => return Ok(Plan::Skip(Skip::NoHost)),
        };
        if let Some(version) = version.filter(|version| !version.supports_hostaddr()) {
            return Ok(Plan::Skip(Skip::HostaddrUnsupported(version)));
        }
        if is_local_path(host) {
            return Ok(Plan::Skip(Skip::LocalSocket));
        }

        let hosts: Vec<&str> = host.split(',').collect();
        let ports = match params.get_nonempty(PORT) {
            Some(port) => {
                let ports: Vec<&str> = port.split(',').collect();
                if ports.len() <= 1 {
                    // A single port applies to every host as is
                    None
                } else if ports.len() != hosts.len() {
                    return Err(Error::PortHostMismatch {
                        hosts: hosts.len(),
                        ports: ports.len(),
                    });
                } else {
                    Some(ports)
                }
            }
            None => None,
        };
        Ok(Plan::Lookup(Targets { hosts, ports }))
    }
}

/// Unix socket directories (`/tmp`) and Windows drive paths (`C:\...`).
fn is_local_path(host: &str) -> bool {
    host.starts_with('/') || host.chars().nth(1) == Some(':')
}
