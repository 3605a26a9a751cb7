//! Given a request and cached response, this figures out whether to use
//! the network, the cache, or both.

use std::cmp;

use http::header::{
    HeaderValue, AGE, DATE, ETAG, EXPIRES, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED,
    WARNING,
};
use tracing::debug;

use crate::cache::CacheControl;
use crate::headers::{parse_http_date_millis, parse_seconds};
use crate::{Request, Response};

const ONE_DAY_MILLIS: u64 = 24 * 60 * 60 * 1000;

/// The decision of whether to satisfy a request from the network, the
/// cache, or both.
///
/// Selecting a strategy may add conditions to the request (like the
/// `If-Modified-Since` header for conditional GETs) or warnings to the
/// cached response (if the cached data is potentially stale).
///
/// | network request | cache response | meaning                                    |
/// |-----------------|----------------|--------------------------------------------|
/// | present         | absent         | network only                               |
/// | absent          | present        | serve from cache                           |
/// | present         | present        | conditional GET, validated by the origin   |
/// | absent          | absent         | forbidden; the caller must synthesize a 504 |
///
/// The last row occurs when the request carries `only-if-cached` and the
/// cache cannot satisfy it.
#[derive(Debug)]
pub struct CacheStrategy {
    network_request: Option<Request>,
    cache_response: Option<Response>,
}

impl CacheStrategy {
    fn network_only(request: Request) -> CacheStrategy {
        CacheStrategy {
            network_request: Some(request),
            cache_response: None,
        }
    }

    /// The request to send on the network, or `None` if this call doesn't
    /// use the network.
    pub fn network_request(&self) -> Option<&Request> {
        self.network_request.as_ref()
    }

    /// The cached response to return or validate, or `None` if this call
    /// doesn't use a cache.
    pub fn cache_response(&self) -> Option<&Response> {
        self.cache_response.as_ref()
    }

    /// Decomposes the strategy into its two optional halves.
    pub fn into_parts(self) -> (Option<Request>, Option<Response>) {
        (self.network_request, self.cache_response)
    }

    /// Returns true if `response` can be stored to later serve another
    /// request.
    pub fn is_cacheable(response: &Response, request: &Request) -> bool {
        let response_caching = response.cache_control();
        // Always go to network for uncacheable response codes (RFC 7231
        // section 6.1). This implementation doesn't support caching
        // partial content.
        match response.status().as_u16() {
            200 | 203 | 204 | 300 | 301 | 308 | 404 | 405 | 410 | 414 | 501 => {
                // These codes can be cached unless headers forbid it.
            }
            302 | 307 => {
                // These codes can only be cached with the right response
                // headers. s-maxage is not checked because this is a
                // private cache that should ignore s-maxage.
                if response.headers().get(EXPIRES).is_none()
                    && response_caching.max_age().is_none()
                    && !response_caching.is_public()
                    && !response_caching.is_private()
                {
                    return false;
                }
            }
            // All other codes cannot be cached.
            _ => return false,
        }

        // A 'no-store' directive on request or response prevents the
        // response from being cached.
        !response_caching.no_store() && !request.cache_control().no_store()
    }
}

/// Computes a [`CacheStrategy`] from a request and a candidate cached
/// response.
///
/// The factory parses the candidate's validator headers once at
/// construction; [`get`][Factory::get] then runs the decision rules
/// against a caller-supplied clock reading.
#[derive(Debug)]
pub struct Factory {
    /// The instant the strategy is computed for, in milliseconds since
    /// the Unix epoch.
    now_millis: u64,
    request: Request,
    cache_response: Option<Response>,

    /// When the cached request was first initiated.
    sent_request_millis: u64,
    /// When the cached response was first received.
    received_response_millis: u64,

    /// The server's time when the cached response was served, if known.
    served_date: Option<u64>,
    served_date_value: Option<HeaderValue>,

    /// The last modified date of the cached response, if known.
    last_modified: Option<u64>,
    last_modified_value: Option<HeaderValue>,

    /// The expiration date of the cached response, if known. If both this
    /// field and the max age are set, the max age is preferred.
    expires: Option<u64>,

    /// Etag of the cached response.
    etag: Option<HeaderValue>,

    /// Age of the cached response when it was served.
    age_seconds: Option<u64>,
}

impl Factory {
    /// Creates a factory for `request` and the candidate `cache_response`,
    /// evaluated as of `now_millis`.
    pub fn new(now_millis: u64, request: Request, cache_response: Option<Response>) -> Factory {
        let mut factory = Factory {
            now_millis,
            request,
            cache_response,
            sent_request_millis: 0,
            received_response_millis: 0,
            served_date: None,
            served_date_value: None,
            last_modified: None,
            last_modified_value: None,
            expires: None,
            etag: None,
            age_seconds: None,
        };

        if let Some(ref response) = factory.cache_response {
            factory.sent_request_millis = response.sent_request_at_millis();
            factory.received_response_millis = response.received_response_at_millis();
            for (name, value) in response.headers() {
                if name == &DATE {
                    factory.served_date = parse_http_date_millis(value);
                    factory.served_date_value = Some(value.clone());
                } else if name == &EXPIRES {
                    factory.expires = parse_http_date_millis(value);
                } else if name == &LAST_MODIFIED {
                    factory.last_modified = parse_http_date_millis(value);
                    factory.last_modified_value = Some(value.clone());
                } else if name == &ETAG {
                    factory.etag = Some(value.clone());
                } else if name == &AGE {
                    factory.age_seconds = value.to_str().ok().and_then(parse_seconds);
                }
            }
        }

        factory
    }

    /// Returns a strategy to satisfy the request using the cached
    /// response.
    pub fn get(self) -> CacheStrategy {
        let only_if_cached = self.request.cache_control().only_if_cached();
        let candidate = self.get_candidate();

        if candidate.network_request.is_some() && only_if_cached {
            // We're forbidden from using the network and the cache is
            // insufficient.
            debug!("network forbidden by only-if-cached, cache insufficient");
            return CacheStrategy {
                network_request: None,
                cache_response: None,
            };
        }

        candidate
    }

    /// Returns a strategy to use assuming the request can use the network.
    fn get_candidate(mut self) -> CacheStrategy {
        // No cached response.
        let cache_response = match self.cache_response.take() {
            Some(response) => response,
            None => return CacheStrategy::network_only(self.request),
        };

        // Drop the cached response if it's missing a required handshake.
        if self.request.is_https() && !cache_response.has_handshake() {
            return CacheStrategy::network_only(self.request);
        }

        // If this response shouldn't have been stored, it should never be
        // used as a response source. This check should be redundant as long
        // as the persistence store is well-behaved and the rules are
        // constant.
        if !CacheStrategy::is_cacheable(&cache_response, &self.request) {
            return CacheStrategy::network_only(self.request);
        }

        let request_caching = self.request.cache_control();
        if request_caching.no_cache() || has_conditions(&self.request) {
            // The requester insists on the origin arbitrating.
            return CacheStrategy::network_only(self.request);
        }

        let response_caching = cache_response.cache_control();

        let age_millis = self.cache_response_age();
        let mut fresh_millis = self.compute_freshness_lifetime(&cache_response, &response_caching);

        if let Some(max_age) = request_caching.max_age() {
            fresh_millis = cmp::min(fresh_millis, seconds_to_millis(max_age));
        }

        let min_fresh_millis = request_caching
            .min_fresh()
            .map(seconds_to_millis)
            .unwrap_or(0);

        let mut max_stale_millis = 0;
        if !response_caching.must_revalidate() {
            if let Some(max_stale) = request_caching.max_stale() {
                max_stale_millis = seconds_to_millis(max_stale);
            }
        }

        if !response_caching.no_cache()
            && age_millis.saturating_add(min_fresh_millis)
                < fresh_millis.saturating_add(max_stale_millis)
        {
            let mut response = cache_response;
            if age_millis.saturating_add(min_fresh_millis) >= fresh_millis {
                response.headers_mut().append(
                    WARNING,
                    HeaderValue::from_static("110 HttpURLConnection \"Response is stale\""),
                );
            }
            if age_millis > ONE_DAY_MILLIS
                && self.is_freshness_lifetime_heuristic(&response_caching)
            {
                response.headers_mut().append(
                    WARNING,
                    HeaderValue::from_static("113 HttpURLConnection \"Heuristic expiration\""),
                );
            }
            debug!(age_millis, fresh_millis, "serving from cache");
            return CacheStrategy {
                network_request: None,
                cache_response: Some(response),
            };
        }

        // Find a condition to add to the request. If the condition is
        // satisfied, the response body will not be transmitted.
        let (condition_name, condition_value) = if let Some(etag) = self.etag.take() {
            (IF_NONE_MATCH, etag)
        } else if let Some(last_modified) = self.last_modified_value.take() {
            (IF_MODIFIED_SINCE, last_modified)
        } else if let Some(served_date) = self.served_date_value.take() {
            (IF_MODIFIED_SINCE, served_date)
        } else {
            // No condition! Make a regular request.
            return CacheStrategy::network_only(self.request);
        };

        debug!(condition = %condition_name, "revalidating with the origin");
        let mut conditional_request = self.request;
        conditional_request
            .headers_mut()
            .insert(condition_name, condition_value);
        CacheStrategy {
            network_request: Some(conditional_request),
            cache_response: Some(cache_response),
        }
    }

    /// Returns the number of milliseconds that the response was fresh for,
    /// starting from the served date.
    fn compute_freshness_lifetime(
        &self,
        cache_response: &Response,
        response_caching: &CacheControl,
    ) -> u64 {
        if let Some(max_age) = response_caching.max_age() {
            return seconds_to_millis(max_age);
        }
        if let Some(expires) = self.expires {
            let served_millis = self.served_date.unwrap_or(self.received_response_millis);
            return expires.saturating_sub(served_millis);
        }
        if let Some(last_modified) = self.last_modified {
            if cache_response.url().query().is_none() {
                // As recommended by the HTTP RFC and implemented in
                // Firefox, the max age of a document should be defaulted
                // to 10% of the document's age at the time it was served.
                // Default expiration dates aren't used for URIs containing
                // a query.
                let served_millis = self.served_date.unwrap_or(self.sent_request_millis);
                return served_millis.saturating_sub(last_modified) / 10;
            }
        }
        0
    }

    /// Returns the current age of the response, in milliseconds. The
    /// calculation is specified by RFC 2616, 13.2.3 Age Calculations.
    fn cache_response_age(&self) -> u64 {
        let apparent_received_age = self
            .served_date
            .map(|served| self.received_response_millis.saturating_sub(served))
            .unwrap_or(0);
        let received_age = match self.age_seconds {
            Some(age) => cmp::max(apparent_received_age, seconds_to_millis(age)),
            None => apparent_received_age,
        };
        let response_duration = self
            .received_response_millis
            .saturating_sub(self.sent_request_millis);
        let resident_duration = self.now_millis.saturating_sub(self.received_response_millis);
        received_age
            .saturating_add(response_duration)
            .saturating_add(resident_duration)
    }

    /// Returns true if the freshness lifetime came from a heuristic rather
    /// than from `max-age` or `Expires`. A heuristically fresh response
    /// older than 24 hours must carry a warning.
    fn is_freshness_lifetime_heuristic(&self, response_caching: &CacheControl) -> bool {
        response_caching.max_age().is_none() && self.expires.is_none()
    }
}

/// Returns true if the request already contains conditions that save the
/// server from sending a response the client has locally. A request with
/// its own conditions takes precedence over the built-in cache.
fn has_conditions(request: &Request) -> bool {
    request.headers().get(IF_MODIFIED_SINCE).is_some()
        || request.headers().get(IF_NONE_MATCH).is_some()
}

fn seconds_to_millis(seconds: u64) -> u64 {
    seconds.saturating_mul(1000)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::header::CACHE_CONTROL;
    use http::{StatusCode, Uri};
    use std::time::{Duration, UNIX_EPOCH};

    // An arbitrary whole-second clock reading, in epoch milliseconds.
    const NOW: u64 = 1_000_000_000;

    fn seconds(n: u64) -> u64 {
        n * 1000
    }

    fn days(n: u64) -> u64 {
        n * ONE_DAY_MILLIS
    }

    fn http_date(millis: u64) -> HeaderValue {
        let date = httpdate::fmt_http_date(UNIX_EPOCH + Duration::from_millis(millis));
        HeaderValue::from_str(&date).unwrap()
    }

    fn request() -> Request {
        Request::get(Uri::from_static("http://example.com/"))
    }

    fn request_with_cache_control(value: &'static str) -> Request {
        let mut request = request();
        request
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(value));
        request
    }

    /// A cached 200 served thirty seconds ago, with the given
    /// `Cache-Control` value.
    fn cached_response(cache_control: &'static str) -> Response {
        let mut response =
            Response::new(Uri::from_static("http://example.com/"), StatusCode::OK);
        response.set_sent_request_at_millis(NOW - seconds(31));
        response.set_received_response_at_millis(NOW - seconds(30));
        response
            .headers_mut()
            .insert(DATE, http_date(NOW - seconds(30)));
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(cache_control));
        response
    }

    fn warnings(response: &Response) -> Vec<&str> {
        response
            .headers()
            .get_all(WARNING)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect()
    }

    fn get(request: Request, response: Option<Response>) -> CacheStrategy {
        Factory::new(NOW, request, response).get()
    }

    #[test]
    fn no_cached_response_hits_the_network() {
        let strategy = get(request(), None);
        assert!(strategy.network_request().is_some());
        assert!(strategy.cache_response().is_none());
    }

    #[test]
    fn fresh_response_is_served_from_cache() {
        let strategy = get(request(), Some(cached_response("max-age=60")));
        assert!(strategy.network_request().is_none());
        let served = strategy.cache_response().unwrap();
        assert!(warnings(served).is_empty());
    }

    #[test]
    fn stale_response_becomes_a_conditional_get() {
        let mut response = cached_response("max-age=20");
        response
            .headers_mut()
            .insert(ETAG, HeaderValue::from_static("\"v1\""));

        let strategy = get(request(), Some(response));
        let network = strategy.network_request().unwrap();
        assert_eq!(network.header("if-none-match"), Some("\"v1\""));
        assert!(strategy.cache_response().is_some());
    }

    #[test]
    fn condition_priority_is_etag_then_last_modified_then_date() {
        let mut response = cached_response("max-age=20");
        response
            .headers_mut()
            .insert(LAST_MODIFIED, http_date(NOW - days(2)));
        response
            .headers_mut()
            .insert(ETAG, HeaderValue::from_static("\"v1\""));

        let strategy = get(request(), Some(response.clone()));
        let network = strategy.network_request().unwrap();
        assert_eq!(network.header("if-none-match"), Some("\"v1\""));
        assert!(network.header("if-modified-since").is_none());

        response.headers_mut().remove(ETAG);
        let strategy = get(request(), Some(response.clone()));
        let network = strategy.network_request().unwrap();
        assert_eq!(
            network.header("if-modified-since"),
            http_date(NOW - days(2)).to_str().ok()
        );

        response.headers_mut().remove(LAST_MODIFIED);
        let strategy = get(request(), Some(response));
        let network = strategy.network_request().unwrap();
        assert_eq!(
            network.header("if-modified-since"),
            http_date(NOW - seconds(30)).to_str().ok()
        );
    }

    #[test]
    fn stale_response_without_validators_goes_to_the_network() {
        let mut response = cached_response("max-age=20");
        response.headers_mut().remove(DATE);

        let strategy = get(request(), Some(response));
        assert!(strategy.network_request().is_some());
        assert!(strategy.cache_response().is_none());
        assert!(!strategy
            .network_request()
            .unwrap()
            .headers()
            .contains_key(IF_MODIFIED_SINCE));
    }

    #[test]
    fn only_if_cached_with_unusable_cache_forbids_both() {
        let strategy = get(
            request_with_cache_control("only-if-cached"),
            Some(cached_response("max-age=20")),
        );
        assert!(strategy.network_request().is_none());
        assert!(strategy.cache_response().is_none());
    }

    #[test]
    fn only_if_cached_with_no_cache_forbids_both() {
        let strategy = get(request_with_cache_control("only-if-cached"), None);
        let (network, cache) = strategy.into_parts();
        assert!(network.is_none());
        assert!(cache.is_none());
    }

    #[test]
    fn only_if_cached_with_fresh_cache_is_served() {
        let strategy = get(
            request_with_cache_control("only-if-cached"),
            Some(cached_response("max-age=60")),
        );
        assert!(strategy.network_request().is_none());
        assert!(strategy.cache_response().is_some());
    }

    #[test]
    fn https_request_needs_a_recorded_handshake() {
        let request = Request::get(Uri::from_static("https://example.com/"));
        let mut response =
            Response::new(Uri::from_static("https://example.com/"), StatusCode::OK);
        response.set_sent_request_at_millis(NOW - seconds(31));
        response.set_received_response_at_millis(NOW - seconds(30));
        response
            .headers_mut()
            .insert(DATE, http_date(NOW - seconds(30)));
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static("max-age=60"));

        let strategy = get(request.clone(), Some(response.clone()));
        assert!(strategy.network_request().is_some());
        assert!(strategy.cache_response().is_none());

        response.set_handshake(true);
        let strategy = get(request, Some(response));
        assert!(strategy.network_request().is_none());
        assert!(strategy.cache_response().is_some());
    }

    #[test]
    fn request_no_cache_defers_to_the_origin() {
        let strategy = get(
            request_with_cache_control("no-cache"),
            Some(cached_response("max-age=60")),
        );
        assert!(strategy.network_request().is_some());
        assert!(strategy.cache_response().is_none());
    }

    #[test]
    fn caller_conditions_defer_to_the_origin() {
        let mut request = request();
        request
            .headers_mut()
            .insert(IF_NONE_MATCH, HeaderValue::from_static("\"mine\""));

        let strategy = get(request, Some(cached_response("max-age=60")));
        assert!(strategy.network_request().is_some());
        assert!(strategy.cache_response().is_none());
    }

    #[test]
    fn response_no_cache_forces_revalidation() {
        let mut response = cached_response("max-age=60, no-cache");
        response
            .headers_mut()
            .insert(ETAG, HeaderValue::from_static("\"v1\""));

        let strategy = get(request(), Some(response));
        assert!(strategy.network_request().is_some());
        assert!(strategy.cache_response().is_some());
    }

    #[test]
    fn request_max_age_caps_the_lifetime() {
        let strategy = get(
            request_with_cache_control("max-age=10"),
            Some(cached_response("max-age=60")),
        );
        // Thirty seconds old, but the requester only accepts ten.
        assert!(strategy.network_request().is_some());
    }

    #[test]
    fn request_min_fresh_demands_margin() {
        let strategy = get(
            request_with_cache_control("min-fresh=40"),
            Some(cached_response("max-age=60")),
        );
        // Thirty seconds old with forty demanded: 30 + 40 >= 60.
        assert!(strategy.network_request().is_some());
    }

    #[test]
    fn request_max_stale_accepts_expired_responses() {
        let strategy = get(
            request_with_cache_control("max-stale=100"),
            Some(cached_response("max-age=20")),
        );
        assert!(strategy.network_request().is_none());
        let served = strategy.cache_response().unwrap();
        assert_eq!(
            warnings(served),
            vec!["110 HttpURLConnection \"Response is stale\""]
        );
    }

    #[test]
    fn must_revalidate_overrides_max_stale() {
        let strategy = get(
            request_with_cache_control("max-stale=100"),
            Some(cached_response("max-age=20, must-revalidate")),
        );
        assert!(strategy.network_request().is_some());
    }

    #[test]
    fn heuristic_freshness_uses_a_tenth_of_the_document_age() {
        // Served two days ago, last modified 102 days before that: the
        // heuristic lifetime is ten days.
        let mut response =
            Response::new(Uri::from_static("http://example.com/"), StatusCode::OK);
        response.set_sent_request_at_millis(NOW - days(2));
        response.set_received_response_at_millis(NOW - days(2));
        response
            .headers_mut()
            .insert(DATE, http_date(NOW - days(2)));
        response
            .headers_mut()
            .insert(LAST_MODIFIED, http_date(NOW - days(104)));

        let strategy = get(request(), Some(response));
        assert!(strategy.network_request().is_none());
        let served = strategy.cache_response().unwrap();
        assert_eq!(
            warnings(served),
            vec!["113 HttpURLConnection \"Heuristic expiration\""]
        );
    }

    #[test]
    fn heuristic_freshness_skips_urls_with_queries() {
        let mut response = Response::new(
            Uri::from_static("http://example.com/search?q=rust"),
            StatusCode::OK,
        );
        response.set_sent_request_at_millis(NOW - days(2));
        response.set_received_response_at_millis(NOW - days(2));
        response
            .headers_mut()
            .insert(DATE, http_date(NOW - days(2)));
        response
            .headers_mut()
            .insert(LAST_MODIFIED, http_date(NOW - days(104)));

        let request = Request::get(Uri::from_static("http://example.com/search?q=rust"));
        let strategy = get(request, Some(response));
        assert!(strategy.network_request().is_some());
        assert_eq!(
            strategy.network_request().unwrap().header("if-modified-since"),
            http_date(NOW - days(104)).to_str().ok()
        );
    }

    #[test]
    fn expires_header_grants_freshness() {
        let mut response = cached_response("");
        response
            .headers_mut()
            .insert(EXPIRES, http_date(NOW + seconds(60)));

        let strategy = get(request(), Some(response));
        assert!(strategy.network_request().is_none());
        // Expires without max-age is explicit, not heuristic.
        assert!(warnings(strategy.cache_response().unwrap()).is_empty());
    }

    #[test]
    fn age_header_extends_the_computed_age() {
        // Ten seconds resident, but the upstream cache already held it for
        // sixty: too old for max-age=30.
        let mut response = cached_response("max-age=30");
        response.set_sent_request_at_millis(NOW - seconds(11));
        response.set_received_response_at_millis(NOW - seconds(10));
        response
            .headers_mut()
            .insert(DATE, http_date(NOW - seconds(10)));
        response
            .headers_mut()
            .insert(AGE, HeaderValue::from_static("60"));

        let strategy = get(request(), Some(response));
        assert!(strategy.network_request().is_some());
    }

    #[test]
    fn cacheable_status_codes() {
        for code in [200, 203, 204, 300, 301, 308, 404, 405, 410, 414, 501] {
            let response = Response::new(
                Uri::from_static("http://example.com/"),
                StatusCode::from_u16(code).unwrap(),
            );
            assert!(
                CacheStrategy::is_cacheable(&response, &request()),
                "status {} should be cacheable",
                code
            );
        }
    }

    #[test]
    fn uncacheable_status_codes() {
        for code in [201, 302, 303, 307, 400, 500, 502, 503] {
            let response = Response::new(
                Uri::from_static("http://example.com/"),
                StatusCode::from_u16(code).unwrap(),
            );
            assert!(
                !CacheStrategy::is_cacheable(&response, &request()),
                "status {} should not be cacheable",
                code
            );
        }
    }

    #[test]
    fn redirects_are_cacheable_with_explicit_lifetime() {
        for code in [302, 307] {
            for header_value in ["max-age=60", "public", "private"] {
                let mut response = Response::new(
                    Uri::from_static("http://example.com/"),
                    StatusCode::from_u16(code).unwrap(),
                );
                response
                    .headers_mut()
                    .insert(CACHE_CONTROL, HeaderValue::from_static(header_value));
                assert!(
                    CacheStrategy::is_cacheable(&response, &request()),
                    "status {} with {} should be cacheable",
                    code,
                    header_value
                );
            }

            let mut response = Response::new(
                Uri::from_static("http://example.com/"),
                StatusCode::from_u16(code).unwrap(),
            );
            response
                .headers_mut()
                .insert(EXPIRES, http_date(NOW + seconds(60)));
            assert!(CacheStrategy::is_cacheable(&response, &request()));
        }
    }

    #[test]
    fn no_store_forbids_caching() {
        let response = cached_response("no-store");
        assert!(!CacheStrategy::is_cacheable(&response, &request()));

        let response = cached_response("max-age=60");
        let request = request_with_cache_control("no-store");
        assert!(!CacheStrategy::is_cacheable(&response, &request));
    }

    #[test]
    fn non_storable_cached_response_is_ignored() {
        let mut response = cached_response("no-store");
        response
            .headers_mut()
            .insert(ETAG, HeaderValue::from_static("\"v1\""));

        let strategy = get(request(), Some(response));
        assert!(strategy.network_request().is_some());
        assert!(strategy.cache_response().is_none());
    }
}
