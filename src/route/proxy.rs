//! Proxy servers and proxy selection.

use std::fmt;
use std::io;

use http::Uri;

/// A proxy server's host and port.
///
/// The host may be a name or an IP literal; whether it is resolved locally
/// depends on the proxy type carrying it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HostPort {
    host: String,
    port: u16,
}

impl HostPort {
    /// Creates a host/port pair.
    pub fn new(host: impl Into<String>, port: u16) -> HostPort {
        HostPort {
            host: host.into(),
            port,
        }
    }

    /// The host name or IP literal.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for HostPort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A proxy through which a connection may be made, or none at all.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Proxy {
    /// Connect directly to the origin server.
    Direct,
    /// Connect through an HTTP proxy. The proxy's own host is resolved
    /// locally.
    Http(HostPort),
    /// Connect through a SOCKS proxy. The target host is resolved by the
    /// proxy, not locally.
    Socks(HostPort),
}

impl Proxy {
    /// Whether this is the no-proxy sentinel.
    pub fn is_direct(&self) -> bool {
        matches!(self, Proxy::Direct)
    }
}

/// Selects the proxies to attempt for a URL, and hears about the ones that
/// fail.
///
/// This is the seam for system proxy configuration, PAC evaluation, and the
/// like; the route selector only consumes the ordered list.
pub trait ProxySelector: Send + Sync {
    /// The proxies to try for `url`, in order of preference.
    ///
    /// Returning `None` or an empty list means "connect directly".
    fn select(&self, url: &Uri) -> Option<Vec<Proxy>>;

    /// Called when a connection to `proxy` could not be established.
    fn connect_failed(&self, url: &Uri, proxy: &Proxy, error: &io::Error) {
        let _ = (url, proxy, error);
    }
}

/// A proxy selector that always connects directly.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultProxySelector;

impl ProxySelector for DefaultProxySelector {
    fn select(&self, _url: &Uri) -> Option<Vec<Proxy>> {
        None
    }
}
