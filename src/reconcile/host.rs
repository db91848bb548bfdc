// src/reconcile/host.rs

//! Finding the address this host advertises to peers.

use std::fmt::Debug;
use std::future::Future;
use std::net::IpAddr;
use std::pin::Pin;

use gethostname::gethostname;
use tracing::debug;

use crate::errors::{Result, SeedwatchError};

/// Source of the address passed to the seeder.
///
/// Production resolves the hostname; tests and `--advertise-address` pin it.
pub trait HostResolver: Send + Sync + Debug {
    fn resolve(&self) -> Pin<Box<dyn Future<Output = Result<IpAddr>> + Send + '_>>;
}

/// Resolve this machine's hostname through the system resolver, preferring
/// an IPv4 address.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemHostResolver;

impl HostResolver for SystemHostResolver {
    fn resolve(&self) -> Pin<Box<dyn Future<Output = Result<IpAddr>> + Send + '_>> {
        Box::pin(async move {
            let host = gethostname().into_string().map_err(|raw| {
                SeedwatchError::HostAddress(format!("hostname {raw:?} is not valid UTF-8"))
            })?;

            let addrs: Vec<IpAddr> = tokio::net::lookup_host((host.as_str(), 0))
                .await
                .map_err(|e| SeedwatchError::HostAddress(format!("resolving {host}: {e}")))?
                .map(|sa| sa.ip())
                .collect();

            let addr = addrs
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| addrs.first())
                .copied()
                .ok_or_else(|| {
                    SeedwatchError::HostAddress(format!("{host} resolved to no addresses"))
                })?;

            debug!(%host, %addr, "resolved host address");
            Ok(addr)
        })
    }
}

/// Always answers with the same address.
#[derive(Debug, Clone, Copy)]
pub struct StaticHostResolver(pub IpAddr);

impl HostResolver for StaticHostResolver {
    fn resolve(&self) -> Pin<Box<dyn Future<Output = Result<IpAddr>> + Send + '_>> {
        let addr = self.0;
        Box::pin(async move { Ok(addr) })
    }
}
