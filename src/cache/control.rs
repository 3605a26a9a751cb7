//! Parsing of `Cache-Control` directives.

use http::header::{HeaderMap, CACHE_CONTROL, PRAGMA};

use crate::headers::parse_seconds;

/// The cache directives of a request or response.
///
/// Directives are collected from every `Cache-Control` header and, for
/// compatibility with HTTP/1.0 intermediaries, from `Pragma` headers too.
/// Unrecognized directives are ignored. Duration-valued directives are
/// `None` when absent or malformed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheControl {
    no_cache: bool,
    no_store: bool,
    max_age: Option<u64>,
    s_max_age: Option<u64>,
    private: bool,
    public: bool,
    must_revalidate: bool,
    max_stale: Option<u64>,
    min_fresh: Option<u64>,
    only_if_cached: bool,
    no_transform: bool,
    immutable: bool,
}

impl CacheControl {
    /// Parses the cache directives of `headers`.
    pub fn parse(headers: &HeaderMap) -> CacheControl {
        let mut control = CacheControl::default();
        let values = headers
            .get_all(CACHE_CONTROL)
            .iter()
            .chain(headers.get_all(PRAGMA).iter());
        for value in values {
            if let Ok(value) = value.to_str() {
                control.parse_value(value);
            }
        }
        control
    }

    fn parse_value(&mut self, value: &str) {
        const BLANK: &[char] = &[' ', '\t'];
        const SEPARATORS: &[char] = &[',', '=', ' ', '\t'];

        let mut rest = value;
        loop {
            rest = rest.trim_start_matches(|c| c == ' ' || c == '\t' || c == ',');
            if rest.is_empty() {
                break;
            }
            let end = rest.find(SEPARATORS).unwrap_or(rest.len());
            let directive = &rest[..end];
            rest = rest[end..].trim_start_matches(BLANK);

            let mut argument = None;
            if let Some(after_eq) = rest.strip_prefix('=') {
                let after_eq = after_eq.trim_start_matches(BLANK);
                if let Some(quoted) = after_eq.strip_prefix('"') {
                    match quoted.find('"') {
                        Some(close) => {
                            argument = Some(&quoted[..close]);
                            rest = &quoted[close + 1..];
                        }
                        None => {
                            // An unterminated quote runs to the end of the
                            // value.
                            argument = Some(quoted);
                            rest = "";
                        }
                    }
                } else {
                    let end = after_eq.find(SEPARATORS).unwrap_or(after_eq.len());
                    argument = Some(&after_eq[..end]);
                    rest = &after_eq[end..];
                }
            }

            self.apply(directive, argument);
        }
    }

    fn apply(&mut self, directive: &str, argument: Option<&str>) {
        if directive.eq_ignore_ascii_case("no-cache") {
            self.no_cache = true;
        } else if directive.eq_ignore_ascii_case("no-store") {
            self.no_store = true;
        } else if directive.eq_ignore_ascii_case("max-age") {
            self.max_age = argument.and_then(parse_seconds);
        } else if directive.eq_ignore_ascii_case("s-maxage") {
            self.s_max_age = argument.and_then(parse_seconds);
        } else if directive.eq_ignore_ascii_case("private") {
            self.private = true;
        } else if directive.eq_ignore_ascii_case("public") {
            self.public = true;
        } else if directive.eq_ignore_ascii_case("must-revalidate") {
            self.must_revalidate = true;
        } else if directive.eq_ignore_ascii_case("max-stale") {
            // A bare max-stale accepts any staleness.
            self.max_stale = Some(argument.and_then(parse_seconds).unwrap_or(u64::MAX));
        } else if directive.eq_ignore_ascii_case("min-fresh") {
            self.min_fresh = argument.and_then(parse_seconds);
        } else if directive.eq_ignore_ascii_case("only-if-cached") {
            self.only_if_cached = true;
        } else if directive.eq_ignore_ascii_case("no-transform") {
            self.no_transform = true;
        } else if directive.eq_ignore_ascii_case("immutable") {
            self.immutable = true;
        }
    }

    /// In a response, the response must be validated before being served;
    /// in a request, a cached response must not be served without
    /// validation.
    pub fn no_cache(&self) -> bool {
        self.no_cache
    }

    /// The message must not be stored in a cache.
    pub fn no_store(&self) -> bool {
        self.no_store
    }

    /// The duration past its served date a response may be served without
    /// validation, in seconds.
    pub fn max_age(&self) -> Option<u64> {
        self.max_age
    }

    /// The `max-age` for shared caches, in seconds. Not honored by this
    /// private cache, but preserved for callers that are.
    pub fn s_max_age(&self) -> Option<u64> {
        self.s_max_age
    }

    /// The response is for a single user and must not be stored by a
    /// shared cache.
    pub fn is_private(&self) -> bool {
        self.private
    }

    /// The response may be stored even when it would otherwise be
    /// non-cacheable.
    pub fn is_public(&self) -> bool {
        self.public
    }

    /// A stale response must not be served without validation, overriding
    /// the request's `max-stale`.
    pub fn must_revalidate(&self) -> bool {
        self.must_revalidate
    }

    /// How far past expiry the requester will still accept a response, in
    /// seconds. A bare `max-stale` parses as unlimited.
    pub fn max_stale(&self) -> Option<u64> {
        self.max_stale
    }

    /// How much remaining freshness the requester demands, in seconds.
    pub fn min_fresh(&self) -> Option<u64> {
        self.min_fresh
    }

    /// The requester forbids the network; only a cached response may
    /// satisfy the request.
    pub fn only_if_cached(&self) -> bool {
        self.only_if_cached
    }

    /// Intermediaries must not transform the payload.
    pub fn no_transform(&self) -> bool {
        self.no_transform
    }

    /// The response will not change while fresh.
    pub fn immutable(&self) -> bool {
        self.immutable
    }
}
