//! Enumerates the routes to attempt for an address.

use std::collections::VecDeque;
use std::io;
use std::net::SocketAddr;

use tracing::trace;

use crate::route::{Address, Proxy, Route, RouteDatabase, TargetAddr};
use crate::{Error, Result};

/// Selects routes to connect to an origin server.
///
/// Each connection attempt owns one selector. It walks the proxies in
/// preference order and, for each, the socket addresses that proxy implies,
/// yielding one [`Route`] at a time. Routes the shared [`RouteDatabase`]
/// remembers as failed are held back and yielded only once every fresh
/// candidate is exhausted.
///
/// Every address has at least one route.
#[derive(Debug)]
pub struct RouteSelector {
    address: Address,
    route_database: RouteDatabase,

    /* State for negotiating the next proxy to use. */
    proxies: Vec<Proxy>,
    next_proxy_index: usize,

    /* State for negotiating the next socket address to use. */
    last_proxy: Option<Proxy>,
    socket_addresses: Vec<TargetAddr>,
    next_socket_address_index: usize,

    /* State for negotiating failed routes. */
    postponed_routes: VecDeque<Route>,
}

impl RouteSelector {
    /// Creates a selector for `address`.
    ///
    /// An explicitly pinned proxy is the only one tried; otherwise the
    /// address's proxy selector is consulted, falling back to a direct
    /// connection when it offers nothing.
    pub fn new(address: Address, route_database: RouteDatabase) -> RouteSelector {
        let proxies = match address.proxy() {
            // If the user specifies a proxy, try that and only that.
            Some(proxy) => vec![proxy.clone()],
            // Try each of the ProxySelector choices until one connection
            // succeeds.
            None => address
                .proxy_selector()
                .select(address.url())
                .filter(|proxies| !proxies.is_empty())
                .unwrap_or_else(|| vec![Proxy::Direct]),
        };
        RouteSelector {
            address,
            route_database,
            proxies,
            next_proxy_index: 0,
            last_proxy: None,
            socket_addresses: Vec::new(),
            next_socket_address_index: 0,
            postponed_routes: VecDeque::new(),
        }
    }

    /// Returns true if there's another route to attempt.
    pub fn has_next(&self) -> bool {
        self.has_next_socket_address() || self.has_next_proxy() || self.has_next_postponed()
    }

    /// Returns the next route to attempt.
    ///
    /// # Errors
    ///
    /// Fails with an exhaustion error once every candidate has been
    /// yielded, with an I/O error if a DNS lookup fails, and with a
    /// configuration error for an out-of-range port.
    pub fn next(&mut self) -> Result<Route> {
        // Known-failed routes are skipped, not recursed over; they are
        // tried last, from the postponed buffer.
        loop {
            if !self.has_next_socket_address() {
                if !self.has_next_proxy() {
                    return match self.postponed_routes.pop_front() {
                        Some(route) => Ok(route),
                        None => Err(Error::new_exhausted()),
                    };
                }
                self.next_proxy()?;
            }
            let socket_addr = self.next_socket_address()?;
            let proxy = self
                .last_proxy
                .clone()
                .expect("a proxy is selected before socket addresses exist");
            let route = Route::new(self.address.clone(), proxy, socket_addr);

            if self.route_database.should_postpone(&route) {
                trace!(route = %route, "postponing recently failed route");
                self.postponed_routes.push_back(route);
                continue;
            }

            return Ok(route);
        }
    }

    /// Clients should invoke this method when they encounter a
    /// connectivity failure on a connection returned by this route
    /// selector.
    pub fn connect_failed(&self, failed_route: &Route, failure: &io::Error) {
        if !failed_route.proxy().is_direct() {
            // Tell the proxy selector when we fail to connect on a fresh
            // connection.
            self.address.proxy_selector().connect_failed(
                self.address.url(),
                failed_route.proxy(),
                failure,
            );
        }
        self.route_database.failed(failed_route);
    }

    /// Returns true if there's another proxy to try.
    fn has_next_proxy(&self) -> bool {
        self.next_proxy_index < self.proxies.len()
    }

    /// Advances to the next proxy and prepares its socket addresses.
    fn next_proxy(&mut self) -> Result<()> {
        if !self.has_next_proxy() {
            return Err(Error::new_io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!(
                    "no route to {}; exhausted proxy configurations",
                    self.address.host()
                ),
            )));
        }
        let proxy = self.proxies[self.next_proxy_index].clone();
        self.next_proxy_index += 1;
        self.reset_next_socket_address(&proxy)?;
        self.last_proxy = Some(proxy);
        Ok(())
    }

    /// Prepares the socket addresses to attempt for the current proxy or
    /// host.
    fn reset_next_socket_address(&mut self, proxy: &Proxy) -> Result<()> {
        // Clear the addresses. Necessary if the lookup below fails.
        self.socket_addresses = Vec::new();

        let (socket_host, socket_port) = match proxy {
            Proxy::Direct | Proxy::Socks(_) => {
                (self.address.host().to_owned(), self.address.port())
            }
            Proxy::Http(host_port) => (host_port.host().to_owned(), host_port.port()),
        };

        if socket_port == 0 {
            return Err(Error::new_config().with(format!(
                "no route to {}:{}; port is out of range",
                socket_host, socket_port
            )));
        }

        match proxy {
            Proxy::Socks(_) => {
                // The SOCKS proxy performs the DNS lookup.
                self.socket_addresses
                    .push(TargetAddr::Domain(socket_host, socket_port));
            }
            _ => {
                // Try each address for best behavior in mixed IPv4/IPv6
                // environments.
                let addresses = self
                    .address
                    .dns()
                    .lookup(&socket_host)
                    .map_err(Error::new_io)?;
                trace!(host = %socket_host, count = addresses.len(), "resolved");
                for ip in addresses {
                    self.socket_addresses
                        .push(TargetAddr::Ip(SocketAddr::new(ip, socket_port)));
                }
            }
        }
        self.next_socket_address_index = 0;
        Ok(())
    }

    /// Returns true if there's another socket address to try.
    fn has_next_socket_address(&self) -> bool {
        self.next_socket_address_index < self.socket_addresses.len()
    }

    /// Returns the next socket address to try.
    fn next_socket_address(&mut self) -> Result<TargetAddr> {
        if !self.has_next_socket_address() {
            return Err(Error::new_io(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!(
                    "no route to {}; exhausted socket addresses",
                    self.address.host()
                ),
            )));
        }
        let socket_addr = self.socket_addresses[self.next_socket_address_index].clone();
        self.next_socket_address_index += 1;
        Ok(socket_addr)
    }

    /// Returns true if there is another postponed route to try.
    fn has_next_postponed(&self) -> bool {
        !self.postponed_routes.is_empty()
    }
}
