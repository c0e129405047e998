//! HTTP cache validation module
//!
//! `Last-Modified` formatting and `If-Modified-Since` evaluation.

use chrono::{DateTime, Utc};
use std::time::SystemTime;

/// Format a timestamp as an IMF-fixdate, e.g. `Sun, 06 Nov 1994 08:49:37 GMT`
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

/// Check whether the client's `If-Modified-Since` makes a 304 appropriate
///
/// Comparison is at second precision since that is all the header carries.
/// Unparseable dates never match.
pub fn not_modified_since(if_modified_since: Option<&str>, modified: SystemTime) -> bool {
    let Some(since) = if_modified_since.and_then(|v| DateTime::parse_from_rfc2822(v.trim()).ok())
    else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
}
