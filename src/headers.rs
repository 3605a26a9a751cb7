//! Small helpers for parsing header values.

use std::time::{SystemTime, UNIX_EPOCH};

use http::header::HeaderValue;

/// Parses a non-negative count of seconds, as used by `Age` and the
/// duration-valued cache directives.
///
/// Values too large to represent saturate instead of failing; anything
/// malformed returns `None`.
pub(crate) fn parse_seconds(value: &str) -> Option<u64> {
    let digits = value.trim();
    if digits.is_empty() {
        return None;
    }
    let mut seconds: u64 = 0;
    for b in digits.bytes() {
        if !b.is_ascii_digit() {
            return None;
        }
        seconds = seconds
            .saturating_mul(10)
            .saturating_add(u64::from(b - b'0'));
    }
    Some(seconds)
}

/// Parses an HTTP date header value into milliseconds since the Unix epoch.
///
/// Accepts the three formats RFC 7231 requires (IMF-fixdate, RFC 850,
/// asctime). Dates that cannot be parsed, or that fall before the epoch,
/// return `None`.
pub(crate) fn parse_http_date_millis(value: &HeaderValue) -> Option<u64> {
    let s = value.to_str().ok()?;
    let time = httpdate::parse_http_date(s).ok()?;
    system_time_millis(time)
}

fn system_time_millis(time: SystemTime) -> Option<u64> {
    time.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}
