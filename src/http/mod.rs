//! HTTP protocol layer module
//!
//! Protocol-level helpers shared by static serving and the proxy: range math,
//! response builders, CORS, dates and MIME types. Nothing here touches the filesystem
//! or the network.

pub mod cache;
pub mod cors;
pub mod mime;
pub mod range;
pub mod reconcile;
pub mod response;

use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Empty, Full};
use hyper::body::Bytes;

/// Response body type used by every handler
///
/// Local and rewritten bodies are fully buffered; pass-through proxy bodies stream
/// the upstream `Incoming` body, whose error type is `hyper::Error`.
pub type Body = BoxBody<Bytes, hyper::Error>;

/// Buffered body
pub fn full(data: impl Into<Bytes>) -> Body {
    Full::new(data.into()).map_err(|never| match never {}).boxed()
}

/// Empty body
pub fn empty() -> Body {
    Empty::<Bytes>::new().map_err(|never| match never {}).boxed()
}

// Re-export commonly used types
pub use range::{parse_range_header, parse_range_spec, ByteRange, RangeSpec, Unsatisfiable};
pub use reconcile::{reconcile, Reconciled};
pub use response::{
    build_304_response, build_404_response, build_405_response, build_413_response,
    build_416_response, build_502_response, build_bytes_response,
    build_options_response, build_redirect_response, build_sized_response, build_text_response,
    representation_headers,
};
