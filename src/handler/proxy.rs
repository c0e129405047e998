//! Proxy request handling module
//!
//! Local override, then either a streaming pass-through (the client's `Range` is
//! forwarded and the upstream's answer relayed as-is) or a buffered fetch that is
//! patched and windowed here.

use crate::config::{AppState, ProxyRoute};
use crate::handler::router::RequestContext;
use crate::handler::{resolver, static_files};
use crate::http::{self, Body};
use crate::logger;
use crate::proxy::{self, ProxiedResponse};
use http_body_util::BodyExt;
use hyper::ext::ReasonPhrase;
use hyper::header::{self, HeaderMap, HeaderValue};
use hyper::{Method, Response, StatusCode};

/// Headers recomputed for a patched body
const PATCH_SKIP: [header::HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::CONTENT_ENCODING,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
];

pub async fn serve_proxy(
    ctx: &RequestContext<'_>,
    state: &AppState,
    route_index: usize,
    remainder: &str,
) -> Response<Body> {
    let Some(route) = state.config.proxy.routes.get(route_index) else {
        return http::build_404_response();
    };

    if let Some(dir) = &route.local_override {
        let local = resolver::translate_path(&state.root.join(dir), remainder);
        if local.is_file() {
            logger::log_debug(&format!("Local override for {}", ctx.path));
            return static_files::serve_file(ctx, &local).await;
        }
    }

    let url = proxy::upstream_url(route, remainder, ctx.query);
    match patch_rule(state, route, ctx.path) {
        Some(index) => serve_patched(ctx, state, index, &url).await,
        None => pass_through(ctx, state, &url).await,
    }
}

fn patch_rule(state: &AppState, route: &ProxyRoute, path: &str) -> Option<usize> {
    if route.patch {
        state.patcher.rule_for(path)
    } else {
        None
    }
}

async fn pass_through(ctx: &RequestContext<'_>, state: &AppState, url: &str) -> Response<Body> {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));
    if let Some(range) = ctx
        .range_header
        .as_deref()
        .and_then(|r| HeaderValue::from_str(r).ok())
    {
        headers.insert(header::RANGE, range);
    }

    let method = if ctx.is_head { Method::HEAD } else { Method::GET };
    logger::log_proxy(&method, url);

    match state.fetcher.send(method, url, headers).await {
        Ok(upstream) => {
            let (parts, body) = upstream.into_parts();
            let body = if ctx.is_head {
                http::empty()
            } else {
                body.boxed()
            };
            let mut response = Response::new(body);
            *response.status_mut() = parts.status;
            *response.headers_mut() = proxy::forwardable_headers(&parts.headers, &[]);
            if let Some(reason) = parts.extensions.get::<ReasonPhrase>() {
                response.extensions_mut().insert(reason.clone());
            }
            response
        }
        Err(e) => {
            logger::log_error(&format!("Proxy request to {url} failed: {e}"));
            http::build_502_response()
        }
    }
}

async fn serve_patched(
    ctx: &RequestContext<'_>,
    state: &AppState,
    rule_index: usize,
    url: &str,
) -> Response<Body> {
    logger::log_proxy(&Method::GET, url);

    let upstream = match state.fetcher.fetch_full(url).await {
        Ok(upstream) => upstream,
        Err(e) => {
            logger::log_error(&format!("Proxy fetch of {url} failed: {e}"));
            return http::build_502_response();
        }
    };

    if upstream.status != StatusCode::OK {
        return unpatched(ctx, upstream);
    }
    if let Some(encoding) = content_encoding(&upstream.headers) {
        logger::log_warning(&format!(
            "Upstream {url} sent Content-Encoding '{encoding}', serving unpatched"
        ));
        return unpatched(ctx, upstream);
    }

    let ProxiedResponse { headers, body, .. } = upstream;
    let patched = state.patcher.patch(rule_index, &body).unwrap_or(body);
    let headers = proxy::forwardable_headers(&headers, &PATCH_SKIP);
    let reconciled = http::reconcile(patched, ctx.range_spec(), StatusCode::OK, true);
    http::build_bytes_response(reconciled, headers, ctx.is_head)
}

/// Relay a buffered upstream response without rewriting or re-windowing it
fn unpatched(ctx: &RequestContext<'_>, upstream: ProxiedResponse) -> Response<Body> {
    let headers = proxy::forwardable_headers(&upstream.headers, &[]);
    let reconciled = http::reconcile(upstream.body, None, upstream.status, false);
    let mut response = http::build_bytes_response(reconciled, headers, ctx.is_head);
    if let Some(reason) = upstream.reason {
        response.extensions_mut().insert(reason);
    }
    response
}

/// Non-identity `Content-Encoding`, if any
fn content_encoding(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::CONTENT_ENCODING)?.to_str().ok()?.trim();
    (!value.is_empty() && !value.eq_ignore_ascii_case("identity")).then(|| value.to_string())
}
