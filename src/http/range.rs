//! HTTP Range request parsing module
//!
//! Single-range `bytes=` parsing for partial content. Only the first range of a
//! comma-separated set is honored; later ranges are dropped without error.

use std::fmt;

/// Raw range request as written by the client, before the resource length is known
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// `bytes=first-last`
    Closed(u64, u64),
    /// `bytes=first-`
    OpenEnded(u64),
    /// `bytes=-length`
    Suffix(u64),
}

/// A validated byte window, `start <= end < total`, bounds inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start: u64,
    end: u64,
    total: u64,
}

impl ByteRange {
    pub const fn start(&self) -> u64 {
        self.start
    }

    pub const fn end(&self) -> u64 {
        self.end
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    /// Number of bytes in the window
    pub const fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Value for the `Content-Range` header of a 206 response
    pub fn content_range(&self) -> String {
        format!("bytes {}-{}/{}", self.start, self.end, self.total)
    }

    /// Slice the window out of a buffer holding the whole resource
    pub fn slice<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        let start = usize::try_from(self.start).unwrap_or(usize::MAX);
        let end = usize::try_from(self.end).unwrap_or(usize::MAX);
        data.get(start..=end).unwrap_or_default()
    }
}

/// The requested range lies outside a resource of `total` bytes - answer 416
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unsatisfiable {
    pub total: u64,
}

impl Unsatisfiable {
    /// Value for the `Content-Range` header of a 416 response
    pub fn content_range(&self) -> String {
        format!("bytes */{}", self.total)
    }
}

impl fmt::Display for Unsatisfiable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "range not satisfiable for {} bytes", self.total)
    }
}

impl std::error::Error for Unsatisfiable {}

impl RangeSpec {
    /// Evaluate this range against a resource of `total` bytes
    pub fn resolve(self, total: u64) -> Result<ByteRange, Unsatisfiable> {
        let unsatisfiable = Unsatisfiable { total };
        if total == 0 {
            return Err(unsatisfiable);
        }
        let last = total - 1;

        let (start, end) = match self {
            Self::Closed(first, requested_last) => (first, requested_last.min(last)),
            Self::OpenEnded(first) => (first, last),
            Self::Suffix(length) => (total.saturating_sub(length), last),
        };

        if start > end || start >= total {
            return Err(unsatisfiable);
        }

        Ok(ByteRange { start, end, total })
    }
}

/// Parse the first range of a `Range` header value
///
/// Returns `None` when the header is not a usable `bytes=` range: wrong unit,
/// no digits at all (`bytes=-`), a zero-length suffix, or garbage where the
/// first position should be. Trailing text after the last digit run is ignored.
///
/// # Examples
/// ```
/// use shimserve::http::range::{parse_range_spec, RangeSpec};
///
/// assert_eq!(parse_range_spec("bytes=0-99"), Some(RangeSpec::Closed(0, 99)));
/// assert_eq!(parse_range_spec("bytes=-20, 0-1"), Some(RangeSpec::Suffix(20)));
/// assert_eq!(parse_range_spec("items=0-1"), None);
/// ```
pub fn parse_range_spec(header: &str) -> Option<RangeSpec> {
    let first_unit = header.split(',').next().unwrap_or_default().trim();
    let spec = first_unit.strip_prefix("bytes=")?;

    let (first, rest) = take_digits(spec);
    let rest = rest.strip_prefix('-')?;
    let (last, _) = take_digits(rest);

    match (first, last) {
        (None, None) => None,
        (None, Some(0)) => None,
        (None, Some(length)) => Some(RangeSpec::Suffix(length)),
        (Some(first), None) => Some(RangeSpec::OpenEnded(first)),
        (Some(first), Some(last)) => Some(RangeSpec::Closed(first, last)),
    }
}

/// Parse a `Range` header against a resource of `total` bytes
///
/// * `Ok(None)` - no header or not a usable range, serve the whole resource
/// * `Ok(Some(range))` - serve `range` with 206
/// * `Err(Unsatisfiable)` - answer 416
pub fn parse_range_header(
    range_header: Option<&str>,
    total: u64,
) -> Result<Option<ByteRange>, Unsatisfiable> {
    match range_header.and_then(parse_range_spec) {
        Some(spec) => spec.resolve(total).map(Some),
        None => Ok(None),
    }
}

/// Split a leading run of ASCII digits off `input`, saturating on overflow
fn take_digits(input: &str) -> (Option<u64>, &str) {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    if end == 0 {
        return (None, input);
    }
    let (digits, rest) = input.split_at(end);
    let value = digits.bytes().fold(0u64, |acc, d| {
        acc.saturating_mul(10).saturating_add(u64::from(d - b'0'))
    });
    (Some(value), rest)
}
