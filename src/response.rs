//! An HTTP response, as seen by the cache layer.

use http::{HeaderMap, StatusCode, Uri};

use crate::cache::CacheControl;

/// An HTTP response, plus the metadata the cache layer needs to reason
/// about it.
///
/// Alongside the status and headers, a response remembers the URL of the
/// request that produced it, the timestamps bracketing the exchange, and
/// whether a TLS handshake was recorded. The timestamps are the two
/// extension fields a cache persists with each entry: when the request was
/// first sent and when the response was first received, both in
/// milliseconds since the Unix epoch.
#[derive(Clone, Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    url: Uri,
    sent_request_at_millis: u64,
    received_response_at_millis: u64,
    handshake: bool,
}

impl Response {
    /// Constructs a response for the given request URL and status.
    ///
    /// Headers start empty, the timestamps start at zero, and no handshake
    /// is recorded.
    pub fn new(url: Uri, status: StatusCode) -> Response {
        Response {
            status,
            headers: HeaderMap::new(),
            url,
            sent_request_at_millis: 0,
            received_response_at_millis: 0,
            handshake: false,
        }
    }

    /// The response status.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to the response headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The last value of the named header, if it is present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The URL of the request this response answered.
    pub fn url(&self) -> &Uri {
        &self.url
    }

    /// When the producing request was first sent, in milliseconds since the
    /// Unix epoch.
    pub fn sent_request_at_millis(&self) -> u64 {
        self.sent_request_at_millis
    }

    /// Sets when the producing request was first sent.
    pub fn set_sent_request_at_millis(&mut self, millis: u64) {
        self.sent_request_at_millis = millis;
    }

    /// When this response was first received, in milliseconds since the
    /// Unix epoch.
    pub fn received_response_at_millis(&self) -> u64 {
        self.received_response_at_millis
    }

    /// Sets when this response was first received.
    pub fn set_received_response_at_millis(&mut self, millis: u64) {
        self.received_response_at_millis = millis;
    }

    /// Whether a TLS handshake was recorded with this response.
    pub fn has_handshake(&self) -> bool {
        self.handshake
    }

    /// Records whether this response was received over TLS.
    pub fn set_handshake(&mut self, handshake: bool) {
        self.handshake = handshake;
    }

    /// The cache directives of this response.
    pub fn cache_control(&self) -> CacheControl {
        CacheControl::parse(&self.headers)
    }
}
