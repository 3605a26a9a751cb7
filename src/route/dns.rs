//! The DNS seam.

use std::io;
use std::net::{IpAddr, ToSocketAddrs};

/// A domain name service that resolves host names to IP addresses.
///
/// Implementations return addresses in the order they should be attempted;
/// the route selector preserves that order, which matters in mixed
/// IPv4/IPv6 environments.
pub trait Dns: Send + Sync {
    /// Resolves `host` to an ordered list of IP addresses.
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>>;
}

/// The operating system's resolver.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemDns;

impl Dns for SystemDns {
    fn lookup(&self, host: &str) -> io::Result<Vec<IpAddr>> {
        let addrs = (host, 0u16).to_socket_addrs()?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}
