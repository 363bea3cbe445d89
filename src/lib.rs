#![deny(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]

/*!
Pre-resolution of multi-host database connection parameters.

# Introduction

libpq-style connection strings accept several comma-separated hosts, tried in
order until one accepts the connection:

```text
host=db1.example.com,db2.example.com port=5432,5433 dbname=app
```

Resolving those names happens inside the connection attempt, as a blocking
call. An async client would rather do the lookups itself, without stalling
its scheduler, and hand the connection attempt numeric addresses through the
`hostaddr` parameter:

```text
host=db1.example.com,db2.example.com hostaddr=10.0.0.1,10.0.0.2 port=5432,5433 dbname=app
```

`hostaddr-rs` performs that rewrite. Hosts that fail to resolve are dropped
(together with their port when ports are given per host), keeping the `host`,
`hostaddr` and `port` lists aligned; resolution only fails when no host is
left or when the port list cannot be matched with the host list.

```
# #[tokio::main]
# async fn main() -> Result<(), Box<dyn std::error::Error>> {
use hostaddr_rs::{resolver::fixed::StaticResolver, ConnParams, MultiHostResolver};
let resolver = StaticResolver::new()
    .with_host("foo.com", [1, 1, 1, 1].into())
    .with_host("qux.com", [2, 2, 2, 2].into());
let client = MultiHostResolver::new_with_resolver(resolver);

let mut params = ConnParams::parse("host=foo.com,qux.com port=5432,5433")?;
client.resolve_in_place(&mut params).await?;
assert_eq!(
    params.to_string(),
    "host=foo.com,qux.com hostaddr=1.1.1.1,2.2.2.2 port=5432,5433"
);

// `hostaddr` is now set, so a second pass leaves the parameters alone
let before = params.clone();
client.resolve_in_place(&mut params).await?;
assert_eq!(params, before);
# Ok(())
# }
```

Resolution is skipped when `hostaddr` is already present, when there is no
`host`, when `host` names a local socket directory, or when the protocol
library is too old to accept `hostaddr` (see
[`MultiHostResolver::version_probe`]).

# Alternative Resolvers

Lookups go through the [`HostResolver`] trait. The provided backends are:

- [`SystemResolver`] (feature `system`, default), running `getaddrinfo` on
  tokio's blocking thread pool
- `hickory_resolver::Resolver` (feature `hickory`)
- [`StaticResolver`], answering from a fixed table

[`HostResolver`]: resolver::HostResolver
[`SystemResolver`]: resolver::system::SystemResolver
[`StaticResolver`]: resolver::fixed::StaticResolver
*/

pub mod params;
pub use params::ConnParams;

mod multihost;
pub use multihost::{Error, ExecutionMode, MultiHostResolver, Outcome, Resolved, Skip};

pub mod resolver;

pub mod version;
pub use version::ProtocolVersion;

/// Resolves the hosts in `params` in place with the system resolver.
///
/// Must be called from within a tokio runtime. See
/// [`MultiHostResolver::resolve_in_place`].
#[cfg(feature = "system")]
pub async fn resolve_hostaddr_async(params: &mut ConnParams) -> Result<(), Error> {
    MultiHostResolver::<resolver::system::SystemResolver>::new()
        .resolve_in_place(params)
        .await
}
