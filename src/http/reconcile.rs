//! Range reconciliation module
//!
//! Decides what part of a buffered body answers the client's original `Range`.
//! A body we hold in full (local bytes, synthesized listings, rewritten upstream
//! bodies) is windowed here against its own length. A pass-through upstream body
//! is returned untouched, since the upstream already applied the client's range.

use super::range::{ByteRange, RangeSpec};
use hyper::body::Bytes;
use hyper::StatusCode;

/// Outcome of reconciling a body with the client's range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciled {
    /// Whole body with the given status
    Full { status: StatusCode, body: Bytes },
    /// 206 with the window sliced out of the body
    Partial { range: ByteRange, body: Bytes },
    /// 416, `Content-Range: bytes */total`
    Unsatisfiable { total: u64 },
}

impl Reconciled {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Full { status, .. } => *status,
            Self::Partial { .. } => StatusCode::PARTIAL_CONTENT,
            Self::Unsatisfiable { .. } => StatusCode::RANGE_NOT_SATISFIABLE,
        }
    }
}

/// Reconcile `body` with the client's range request
///
/// * `body` - the body after any rewriting
/// * `client_range` - the range the client asked for, if any
/// * `status` - status to use when the whole body is served
/// * `whole_body` - `body` is the complete representation (local or rewritten).
///   When false the body is an upstream pass-through and is never re-windowed.
pub fn reconcile(
    body: Bytes,
    client_range: Option<RangeSpec>,
    status: StatusCode,
    whole_body: bool,
) -> Reconciled {
    let spec = match client_range {
        Some(spec) if whole_body => spec,
        _ => return Reconciled::Full { status, body },
    };

    match spec.resolve(body.len() as u64) {
        Ok(range) => {
            let start = usize::try_from(range.start()).unwrap_or(usize::MAX);
            let end = usize::try_from(range.end()).unwrap_or(usize::MAX);
            Reconciled::Partial {
                range,
                body: body.slice(start..=end),
            }
        }
        Err(unsatisfiable) => Reconciled::Unsatisfiable {
            total: unsatisfiable.total,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::range::parse_range_spec;

    fn body_of(len: usize) -> Bytes {
        Bytes::from((0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>())
    }

    #[test]
    fn test_no_range_keeps_status_and_body() {
        let body = body_of(10);
        let out = reconcile(body.clone(), None, StatusCode::OK, true);
        assert_eq!(out, Reconciled::Full { status: StatusCode::OK, body });
    }

    #[test]
    fn test_pass_through_never_rewindowed() {
        let body = body_of(10);
        let out = reconcile(
            body.clone(),
            parse_range_spec("bytes=0-1"),
            StatusCode::PARTIAL_CONTENT,
            false,
        );
        assert_eq!(
            out,
            Reconciled::Full {
                status: StatusCode::PARTIAL_CONTENT,
                body
            }
        );
    }

    #[test]
    fn test_range_evaluated_against_rewritten_length() {
        // 2000 upstream bytes grown to 2050 by rewriting
        let body = body_of(2050);
        let out = reconcile(body.clone(), parse_range_spec("bytes=-10"), StatusCode::OK, true);
        match out {
            Reconciled::Partial { range, body: part } => {
                assert_eq!(range.content_range(), "bytes 2040-2049/2050");
                assert_eq!(part, body.slice(2040..));
            }
            other => panic!("Expected Partial, got {other:?}"),
        }
    }

    #[test]
    fn test_prefix_range_denominator_is_new_length() {
        let out = reconcile(body_of(1234), parse_range_spec("bytes=0-9"), StatusCode::OK, true);
        match out {
            Reconciled::Partial { range, body } => {
                assert_eq!(range.content_range(), "bytes 0-9/1234");
                assert_eq!(body.len(), 10);
            }
            other => panic!("Expected Partial, got {other:?}"),
        }
    }

    #[test]
    fn test_unsatisfiable_against_new_length() {
        let out = reconcile(body_of(50), parse_range_spec("bytes=100-200"), StatusCode::OK, true);
        assert_eq!(out, Reconciled::Unsatisfiable { total: 50 });
        assert_eq!(out.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    }
}
