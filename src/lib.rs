#![deny(missing_docs)]
#![deny(missing_debug_implementations)]
#![cfg_attr(test, deny(rust_2018_idioms))]

//! # courier
//!
//! The coordination core of an HTTP/1.1 and HTTPS client: who runs when,
//! which socket to dial, and whether the network is needed at all.
//!
//! Three subsystems compose the crate:
//!
//! - [`Dispatcher`] admits asynchronous calls against a global and a
//!   per-host concurrency limit, queues the excess in FIFO order, and
//!   signals when everything has drained.
//! - [`route::RouteSelector`] enumerates the concrete connection attempts
//!   for an address — proxy by proxy, resolved socket address by resolved
//!   socket address — deferring routes that failed recently to the end.
//! - [`cache::Factory`] decides, from a request and a cached response,
//!   whether to serve from cache, revalidate with a conditional GET, or
//!   bypass the cache, per RFC 7234.
//!
//! The crate deliberately stops at those seams. Wire I/O, TLS, connection
//! pooling, and response bodies belong to the embedding client; they are
//! reached through the small collaborator traits in [`rt`] and [`route`].

#[doc(no_inline)]
pub use http::{header, HeaderMap, Method, StatusCode, Uri};

pub use crate::call::{AsyncCall, Call, SyncCall};
pub use crate::dispatch::Dispatcher;
pub use crate::error::{Error, Result};
pub use crate::request::Request;
pub use crate::response::Response;

pub mod cache;
mod call;
pub mod dispatch;
mod error;
mod headers;
#[cfg(test)]
mod mock;
mod request;
mod response;
pub mod route;
pub mod rt;
