//! HTTP response building module
//!
//! Builders for the status codes this server emits. Headers common to every
//! response (CORS, `Accept-Ranges`, `Server`) are added later by the router.

use super::range::ByteRange;
use super::reconcile::Reconciled;
use super::{empty, full, Body};
use hyper::body::Bytes;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Response, StatusCode};

/// Build 304 Not Modified response
pub fn build_304_response(last_modified: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(header::LAST_MODIFIED, last_modified)
        .body(empty())
        .unwrap_or_else(|e| {
            log_build_error("304", &e);
            Response::new(empty())
        })
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Body> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 405 Method Not Allowed response
pub fn build_405_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::METHOD_NOT_ALLOWED)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::ALLOW, "GET, HEAD, OPTIONS, POST")
        .body(full("405 Method Not Allowed"))
        .unwrap_or_else(|e| {
            log_build_error("405", &e);
            Response::new(empty())
        })
}

/// Build OPTIONS response (preflight request); CORS headers are added by the router
pub fn build_options_response() -> Response<Body> {
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_LENGTH, 0)
        .body(empty())
        .unwrap_or_else(|e| {
            log_build_error("OPTIONS", &e);
            Response::new(empty())
        })
}

/// Build 413 Payload Too Large response
pub fn build_413_response() -> Response<Body> {
    build_text_response(StatusCode::PAYLOAD_TOO_LARGE, "413 Payload Too Large")
}

/// Build 416 Range Not Satisfiable response (no body)
pub fn build_416_response(total: u64) -> Response<Body> {
    Response::builder()
        .status(StatusCode::RANGE_NOT_SATISFIABLE)
        .header(header::CONTENT_RANGE, format!("bytes */{total}"))
        .header(header::CONTENT_LENGTH, 0)
        .body(empty())
        .unwrap_or_else(|e| {
            log_build_error("416", &e);
            Response::new(empty())
        })
}

/// Build 502 Bad Gateway response
pub fn build_502_response() -> Response<Body> {
    build_text_response(StatusCode::BAD_GATEWAY, "502 Bad Gateway")
}

/// Build 301 redirect response
pub fn build_redirect_response(target: &str) -> Response<Body> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, target)
        .header(header::CONTENT_LENGTH, 0)
        .body(empty())
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            Response::new(empty())
        })
}

/// Build a plain-text response
pub fn build_text_response(status: StatusCode, text: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(header::CONTENT_TYPE, "text/plain")
        .header(header::CONTENT_LENGTH, text.len())
        .body(full(text))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(empty())
        })
}

/// Build the response for a reconciled buffered body
///
/// `headers` carries the representation headers (`Content-Type`, `Last-Modified`,
/// filtered upstream headers). `Content-Length` and `Content-Range` are always
/// computed from the reconciled window, never taken from `headers`.
pub fn build_bytes_response(
    reconciled: Reconciled,
    headers: HeaderMap,
    is_head: bool,
) -> Response<Body> {
    match reconciled {
        Reconciled::Full { status, body } => build_sized_response(
            status,
            headers,
            body.len() as u64,
            None,
            (!is_head).then_some(body),
        ),
        Reconciled::Partial { range, body } => build_sized_response(
            StatusCode::PARTIAL_CONTENT,
            headers,
            range.len(),
            Some(&range),
            (!is_head).then_some(body),
        ),
        Reconciled::Unsatisfiable { total } => build_416_response(total),
    }
}

/// Build a response whose length is fixed before any body byte is written
///
/// `body` is `None` for HEAD; `content_length` still describes the representation
/// (or window) a GET would have returned.
pub fn build_sized_response(
    status: StatusCode,
    mut headers: HeaderMap,
    content_length: u64,
    range: Option<&ByteRange>,
    body: Option<Bytes>,
) -> Response<Body> {
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::CONTENT_RANGE);
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(content_length));
    if let Some(value) = range.and_then(|r| HeaderValue::from_str(&r.content_range()).ok()) {
        headers.insert(header::CONTENT_RANGE, value);
    }

    let body = match body {
        Some(data) => full(data),
        None => empty(),
    };
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// Representation headers for a buffered resource
pub fn representation_headers(content_type: &str, last_modified: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(content_type) {
        headers.insert(header::CONTENT_TYPE, value);
    }
    if let Some(value) = last_modified.and_then(|v| HeaderValue::from_str(v).ok()) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    headers
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
