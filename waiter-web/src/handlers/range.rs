//! Range header extraction
//!
//! Parsing and clamping live in `waiter_core::range`; handlers only pull the raw
//! value off the request and pass it down explicitly.

use axum::http::HeaderMap;
use axum::http::header::RANGE;

/// Extracts the raw `Range` header value.
///
/// Returns None if the header is absent or not valid visible ASCII.
pub fn extract_range_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(RANGE)
        .and_then(|range| range.to_str().ok())
        .map(|s| s.to_string())
}
