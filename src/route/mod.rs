//! Route selection.
//!
//! Opening a connection requires a choice of proxy server and socket
//! address. This module enumerates those choices for an [`Address`]: the
//! [`RouteSelector`] walks the cross-product of proxies and resolved
//! addresses, consulting a shared [`RouteDatabase`] so routes that failed
//! recently are attempted last.

mod address;
mod db;
mod dns;
mod proxy;
mod selector;

pub use self::address::Address;
pub use self::db::RouteDatabase;
pub use self::dns::{Dns, SystemDns};
pub use self::proxy::{DefaultProxySelector, HostPort, Proxy, ProxySelector};
pub use self::selector::RouteSelector;

use std::fmt;
use std::net::SocketAddr;

/// The socket address a route connects to.
///
/// Routes through a SOCKS proxy carry the target as an unresolved name,
/// because the proxy performs the DNS lookup; everything else carries a
/// resolved IP address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TargetAddr {
    /// A resolved IP address and port.
    Ip(SocketAddr),
    /// An unresolved host name and port.
    Domain(String, u16),
}

impl TargetAddr {
    /// The port to connect to.
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => addr.fmt(f),
            TargetAddr::Domain(host, port) => write!(f, "{}:{}", host, port),
        }
    }
}

/// A concrete connection attempt: the address, the proxy to go through,
/// and the socket address to dial.
///
/// Each route is one element of the sequence a [`RouteSelector`] emits;
/// the connector tries them until one succeeds.
#[derive(Clone, Debug)]
pub struct Route {
    address: Address,
    proxy: Proxy,
    socket_addr: TargetAddr,
}

impl Route {
    pub(crate) fn new(address: Address, proxy: Proxy, socket_addr: TargetAddr) -> Route {
        Route {
            address,
            proxy,
            socket_addr,
        }
    }

    /// The address this route was derived from.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The proxy this route goes through.
    pub fn proxy(&self) -> &Proxy {
        &self.proxy
    }

    /// The socket address to dial.
    pub fn socket_addr(&self) -> &TargetAddr {
        &self.socket_addr
    }

    /// Whether this route tunnels TLS through an HTTP proxy, which
    /// requires a `CONNECT` exchange before the handshake.
    pub fn requires_tunnel(&self) -> bool {
        matches!(self.proxy, Proxy::Http(_))
            && self.address.url().scheme_str() == Some("https")
    }
}

// Route identity is the connection triple; the address's collaborators are
// behavioral and do not participate.
impl PartialEq for Route {
    fn eq(&self, other: &Route) -> bool {
        self.address.url() == other.address.url()
            && self.proxy == other.proxy
            && self.socket_addr == other.socket_addr
    }
}

impl Eq for Route {}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} via {:?}", self.socket_addr, self.proxy)
    }
}
