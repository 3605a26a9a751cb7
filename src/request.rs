//! An HTTP request, as seen by the dispatch and cache layers.

use http::{HeaderMap, Method, Uri};

use crate::cache::CacheControl;

/// An HTTP request.
///
/// This carries the parts of a request the core layers act on: the method,
/// the target URL, and the headers. Bodies and the fluent construction API
/// live with the transport, outside this crate.
#[derive(Clone, Debug)]
pub struct Request {
    method: Method,
    url: Uri,
    headers: HeaderMap,
}

impl Request {
    /// Constructs a request with the given method and target URL.
    pub fn new(method: Method, url: Uri) -> Request {
        Request {
            method,
            url,
            headers: HeaderMap::new(),
        }
    }

    /// Constructs a `GET` request for the given URL.
    pub fn get(url: Uri) -> Request {
        Request::new(Method::GET, url)
    }

    /// The request method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The target URL.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// The request headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the request headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The last value of the named header, if it is present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Whether the target URL uses the `https` scheme.
    pub fn is_https(&self) -> bool {
        self.url.scheme_str() == Some("https")
    }

    /// The cache directives of this request.
    pub fn cache_control(&self) -> CacheControl {
        CacheControl::parse(&self.headers)
    }
}
