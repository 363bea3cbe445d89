use crate::{
    params::{ConnParams, HOST, HOSTADDR, PORT},
    version::ProtocolVersion,
};
use std::net::IpAddr;

/// Reason resolution was not attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Skip {
    /// `hostaddr` was already supplied.
    HostaddrPresent,
    /// `host` is absent or empty.
    NoHost,
    /// The protocol library is too old to accept `hostaddr`.
    HostaddrUnsupported(ProtocolVersion),
    /// `host` names a local socket directory rather than a network host.
    LocalSocket,
}

/// Hosts that resolved, in their original order, with their addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolved {
    hosts: Vec<String>,
    hostaddrs: Vec<IpAddr>,
    ports: Option<Vec<String>>,
}

impl Resolved {
    pub(crate) fn new(per_host_ports: bool) -> Self {
        Self {
            ports: per_host_ports.then(Vec::new),
            ..Self::default()
        }
    }

    pub(crate) fn push(&mut self, host: &str, addr: IpAddr, port: Option<&str>) {
        self.hosts.push(host.to_string());
        self.hostaddrs.push(addr);
        if let (Some(ports), Some(port)) = (self.ports.as_mut(), port) {
            ports.push(port.to_string());
        }
    }

    /// Gets the surviving hosts.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Gets the address of each surviving host.
    pub fn hostaddrs(&self) -> &[IpAddr] {
        &self.hostaddrs
    }

    /// Gets the port of each surviving host, if ports were given per host.
    pub fn ports(&self) -> Option<&[String]> {
        self.ports.as_deref()
    }

    /// Determines if no host survived.
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Writes `host`, `hostaddr` and, when ports were given per host, `port`
    /// into `params`.
    pub fn apply(&self, params: &mut ConnParams) {
        params.set(HOST, self.hosts.join(","));
        let hostaddrs = self
            .hostaddrs
            .iter()
            .map(IpAddr::to_string)
            .collect::<Vec<_>>();
        params.set(HOSTADDR, hostaddrs.join(","));
        if let Some(ports) = &self.ports {
            params.set(PORT, ports.join(","));
        }
    }
}

/// Result of a successful resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Resolution did not apply to the parameters.
    Skipped(Skip),
    /// At least one host resolved.
    Resolved(Resolved),
}

impl Outcome {
    /// Gets the resolved hosts, if resolution took place.
    pub fn resolved(&self) -> Option<&Resolved> {
        match self {
            Outcome::Resolved(resolved) => Some(resolved),
            Outcome::Skipped(_) => None,
        }
    }

    /// Converts into the resolved hosts, if resolution took place.
    pub fn into_resolved(self) -> Option<Resolved> {
        match self {
            Outcome::Resolved(resolved) => Some(resolved),
            Outcome::Skipped(_) => None,
        }
    }

    /// Merges the outcome into `params`. Skipped outcomes change nothing.
    pub fn apply(&self, params: &mut ConnParams) {
        if let Some(resolved) = self.resolved() {
            resolved.apply(params);
        }
    }
}

#[test]
fn apply_rewrites_only_resolution_params() {
    let mut params = ConnParams::parse("host=foo.com,bad.com,qux.com port=1,2,3 user=bar").unwrap();
    let mut resolved = Resolved::new(true);
    resolved.push("foo.com", [1, 1, 1, 1].into(), Some("1"));
    resolved.push("qux.com", [2, 2, 2, 2].into(), Some("3"));
    Outcome::Resolved(resolved).apply(&mut params);
    assert_eq!(
        params.to_string(),
        "host=foo.com,qux.com hostaddr=1.1.1.1,2.2.2.2 port=1,3 user=bar"
    );
}

#[test]
fn apply_leaves_single_port() {
    let mut params = ConnParams::parse("host=foo.com port=5432").unwrap();
    let mut resolved = Resolved::new(false);
    resolved.push("foo.com", [1, 1, 1, 1].into(), None);
    assert_eq!(resolved.ports(), None);
    resolved.apply(&mut params);
    assert_eq!(params.to_string(), "host=foo.com hostaddr=1.1.1.1 port=5432");
}
