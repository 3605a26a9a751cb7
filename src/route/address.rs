//! A connection target.

use std::fmt;
use std::sync::Arc;

use http::Uri;

use crate::route::{Dns, Proxy, ProxySelector};
use crate::{Error, Result};

/// A specification for a connection to an origin server.
///
/// An address bundles the target URL with the collaborators needed to turn
/// it into concrete routes: a resolver, a proxy selector, and optionally an
/// explicit proxy that overrides the selector entirely.
#[derive(Clone)]
pub struct Address {
    url: Uri,
    host: String,
    port: u16,
    dns: Arc<dyn Dns>,
    proxy_selector: Arc<dyn ProxySelector>,
    proxy: Option<Proxy>,
}

impl Address {
    /// Creates an address for `url`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the URL has no host.
    pub fn new(
        url: Uri,
        dns: Arc<dyn Dns>,
        proxy_selector: Arc<dyn ProxySelector>,
    ) -> Result<Address> {
        let host = match url.host() {
            Some(host) => host.to_owned(),
            None => {
                return Err(Error::new_config().with(format!("URL has no host: {}", url)))
            }
        };
        let port = url.port_u16().unwrap_or_else(|| default_port(&url));
        Ok(Address {
            url,
            host,
            port,
            dns,
            proxy_selector,
            proxy: None,
        })
    }

    /// Pins an explicit proxy, bypassing the proxy selector.
    ///
    /// `Proxy::Direct` is a valid pin: it forces a direct connection even
    /// when the selector would pick a proxy.
    pub fn with_proxy(mut self, proxy: Proxy) -> Address {
        self.proxy = Some(proxy);
        self
    }

    /// The target URL.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// The target host.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The target port, with the scheme default applied.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The resolver used for direct and HTTP-proxied connections.
    pub fn dns(&self) -> &dyn Dns {
        &*self.dns
    }

    /// The proxy selector consulted when no explicit proxy is pinned.
    pub fn proxy_selector(&self) -> &dyn ProxySelector {
        &*self.proxy_selector
    }

    /// The explicitly pinned proxy, if any.
    pub fn proxy(&self) -> Option<&Proxy> {
        self.proxy.as_ref()
    }
}

fn default_port(url: &Uri) -> u16 {
    if url.scheme_str() == Some("https") {
        443
    } else {
        80
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Address")
            .field("url", &self.url)
            .field("proxy", &self.proxy)
            .finish()
    }
}
