//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, the log endpoint,
//! resource resolution and dispatch, then the headers every response carries.

use crate::config::AppState;
use crate::handler::resolver::{self, Resolution};
use crate::handler::{client_log, proxy, static_files};
use crate::http::{self, Body, RangeSpec};
use crate::logger::{self, AccessLogEntry};
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context encapsulating information needed for request processing
#[derive(Debug, Clone)]
pub struct RequestContext<'a> {
    /// Raw path, still percent-encoded
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub range_header: Option<String>,
    pub if_modified_since: Option<String>,
}

impl RequestContext<'_> {
    /// The client's range, or `None` when absent or malformed
    pub fn range_spec(&self) -> Option<RangeSpec> {
        self.range_header.as_deref().and_then(http::parse_range_spec)
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    state: Arc<AppState>,
    peer: SocketAddr,
) -> Result<Response<Body>, Infallible> {
    let started = Instant::now();
    let (parts, body) = req.into_parts();
    let headers = &parts.headers;

    let ctx = RequestContext {
        path: parts.uri.path(),
        query: parts.uri.query(),
        is_head: parts.method == Method::HEAD,
        range_header: header_string(headers, &header::RANGE),
        if_modified_since: header_string(headers, &header::IF_MODIFIED_SINCE),
    };

    let mut response = match &parts.method {
        &Method::OPTIONS => http::build_options_response(),
        &Method::POST => handle_post(&ctx, headers, body, &state).await,
        &Method::GET | &Method::HEAD => route_request(&ctx, &state).await,
        other => {
            logger::log_warning(&format!("Method not allowed: {other}"));
            http::build_405_response()
        }
    };

    finalize(&mut response, &state, headers.get(header::ORIGIN));

    if state.config.logging.access_log {
        let mut entry = AccessLogEntry::new(
            peer.ip().to_string(),
            parts.method.to_string(),
            ctx.path.to_string(),
        );
        entry.query = ctx.query.map(ToString::to_string);
        entry.http_version = version_label(parts.version).to_string();
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        entry.range = ctx.range_header.clone();
        entry.referer = header_string(headers, &header::REFERER);
        entry.user_agent = header_string(headers, &header::USER_AGENT);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Headers present on every response
fn finalize(response: &mut Response<Body>, state: &AppState, origin: Option<&HeaderValue>) {
    let headers = response.headers_mut();
    headers.insert(header::ACCEPT_RANGES, HeaderValue::from_static("bytes"));
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(header::SERVER, server);
    }
    state
        .cors
        .apply(origin.and_then(|o| o.to_str().ok()), headers);
}

async fn handle_post(
    ctx: &RequestContext<'_>,
    headers: &HeaderMap,
    body: Incoming,
    state: &AppState,
) -> Response<Body> {
    if ctx.path != state.config.site.log_endpoint {
        return http::build_404_response();
    }

    let max = state.config.http.max_body_size;
    if let Some(resp) = check_body_size(headers, max) {
        return resp;
    }

    let limit = usize::try_from(max).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => {
            client_log::handle_log_post(&state.client_log, &collected.to_bytes()).await
        }
        Err(e) => {
            if e.is::<http_body_util::LengthLimitError>() {
                logger::log_error(&format!("Request body exceeds {max} bytes"));
                http::build_413_response()
            } else {
                logger::log_warning(&format!("Failed to read request body: {e}"));
                http::build_text_response(StatusCode::BAD_REQUEST, "400 Bad Request")
            }
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Option<Response<Body>> {
    let content_length = headers.get(header::CONTENT_LENGTH)?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Resolve the path and dispatch to the serving subsystem
async fn route_request(ctx: &RequestContext<'_>, state: &AppState) -> Response<Body> {
    let site = &state.config.site;
    match resolver::resolve(ctx.path, ctx.query, &state.config, &state.root) {
        Resolution::Proxy { route, remainder } => {
            proxy::serve_proxy(ctx, state, route, &remainder).await
        }
        Resolution::DirectoryListing(dir) => {
            static_files::serve_listing(ctx, &dir, &site.listing_name).await
        }
        Resolution::Stub(index) => match site.stubs.get(index) {
            Some(stub) => static_files::serve_stub(ctx, stub),
            None => http::build_404_response(),
        },
        Resolution::Local(path) => static_files::serve_file(ctx, &path).await,
        Resolution::Directory(dir) if site.autoindex => {
            static_files::serve_autoindex(ctx, &dir, &site.listing_name).await
        }
        Resolution::Redirect(target) => http::build_redirect_response(&target),
        Resolution::Directory(_) | Resolution::NotFound => http::build_404_response(),
    }
}

fn header_string(headers: &HeaderMap, name: &header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}
