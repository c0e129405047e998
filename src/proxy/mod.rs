//! Upstream proxy module
//!
//! `ProxyFetcher` issues requests to a route's upstream origin over HTTP or HTTPS,
//! either handing back the streaming response for pass-through or buffering the
//! whole body for rewriting. `patch` holds the rewriting rules.

pub mod patch;
pub mod shims;

pub use patch::{apply_rule, ContentPatcher, PatchOutcome, PatchRule, RuleApplication, TextPatch};

use crate::config::{ProxyConfig, ProxyRoute};
use http_body_util::{BodyExt, Empty};
use hyper::body::{Bytes, Incoming};
use hyper::header::{self, HeaderMap, HeaderName, HeaderValue};
use hyper::ext::ReasonPhrase;
use hyper::{Method, Request, Response, StatusCode, Uri};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::fmt;
use std::time::Duration;

/// Hop-by-hop headers never forwarded from upstream
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Redirect hops followed before the upstream answer is relayed as-is
const MAX_REDIRECTS: usize = 5;

type HttpsClient = Client<HttpsConnector<HttpConnector>, Empty<Bytes>>;

#[derive(Debug)]
pub enum ProxyError {
    InvalidUri(String),
    Transport(hyper_util::client::legacy::Error),
    Timeout(Duration),
    Body(hyper::Error),
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUri(uri) => write!(f, "invalid upstream uri: {uri}"),
            Self::Transport(e) => write!(f, "upstream transport error: {e}"),
            Self::Timeout(d) => write!(f, "upstream timed out after {}s", d.as_secs()),
            Self::Body(e) => write!(f, "failed to read upstream body: {e}"),
        }
    }
}

impl std::error::Error for ProxyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Body(e) => Some(e),
            Self::InvalidUri(_) | Self::Timeout(_) => None,
        }
    }
}

/// Fully buffered upstream response
#[derive(Debug, Clone)]
pub struct ProxiedResponse {
    pub status: StatusCode,
    /// Non-canonical reason phrase sent by the upstream
    pub reason: Option<ReasonPhrase>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

pub struct ProxyFetcher {
    client: HttpsClient,
    timeout: Duration,
}

impl ProxyFetcher {
    pub fn new(config: &ProxyConfig) -> Self {
        let timeout = Duration::from_secs(config.upstream_timeout);

        let mut http = HttpConnector::new();
        http.enforce_http(false);
        http.set_nodelay(true);
        http.set_connect_timeout(Some(timeout));

        let https = match hyper_rustls::HttpsConnectorBuilder::new().with_native_roots() {
            Ok(builder) => builder,
            Err(e) => {
                crate::logger::log_warning(&format!(
                    "No usable system root certificates ({e}), using bundled roots"
                ));
                hyper_rustls::HttpsConnectorBuilder::new().with_webpki_roots()
            }
        }
        .https_or_http()
        .enable_http1()
        .wrap_connector(http);

        let client = Client::builder(TokioExecutor::new()).build(https);
        Self { client, timeout }
    }

    /// Send a bodiless request upstream and wait for the response head
    ///
    /// Redirects are followed up to `MAX_REDIRECTS` hops with the same method and
    /// headers; the last response is returned as-is once the limit is reached.
    pub async fn send(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
    ) -> Result<Response<Incoming>, ProxyError> {
        let mut uri: Uri = url
            .parse()
            .map_err(|_| ProxyError::InvalidUri(url.to_string()))?;

        for _ in 0..MAX_REDIRECTS {
            let response = self
                .send_once(method.clone(), uri.clone(), headers.clone())
                .await?;
            let Some(next) = redirect_target(&uri, &response) else {
                return Ok(response);
            };
            crate::logger::log_debug(&format!(
                "Upstream {uri} redirected ({}) to {next}",
                response.status().as_u16()
            ));
            uri = next;
        }
        self.send_once(method, uri, headers).await
    }

    async fn send_once(
        &self,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
    ) -> Result<Response<Incoming>, ProxyError> {
        let mut request = Request::new(Empty::<Bytes>::new());
        *request.method_mut() = method;
        *request.uri_mut() = uri;
        *request.headers_mut() = headers;

        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ProxyError::Transport(e)),
            Err(_) => Err(ProxyError::Timeout(self.timeout)),
        }
    }

    /// Fetch the complete, uncompressed representation for rewriting
    ///
    /// The client's range is deliberately not forwarded: rewriting needs every byte.
    pub async fn fetch_full(&self, url: &str) -> Result<ProxiedResponse, ProxyError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT_ENCODING, HeaderValue::from_static("identity"));

        let response = self.send(Method::GET, url, headers).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let reason = response.extensions().get::<ReasonPhrase>().cloned();
        let body = match tokio::time::timeout(self.timeout, response.into_body().collect()).await
        {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => return Err(ProxyError::Body(e)),
            Err(_) => return Err(ProxyError::Timeout(self.timeout)),
        };

        Ok(ProxiedResponse {
            status,
            reason,
            headers,
            body,
        })
    }
}

/// Upstream URL for `remainder` under `route`, query preserved
pub fn upstream_url(route: &ProxyRoute, remainder: &str, query: Option<&str>) -> String {
    let base = route.upstream.trim_end_matches('/');
    let remainder = remainder.trim_start_matches('/');
    match query {
        Some(q) if !q.is_empty() => format!("{base}/{remainder}?{q}"),
        _ => format!("{base}/{remainder}"),
    }
}

/// Where a 3xx response points, resolved against the URI that produced it
fn redirect_target<B>(current: &Uri, response: &Response<B>) -> Option<Uri> {
    if !matches!(
        response.status(),
        StatusCode::MOVED_PERMANENTLY
            | StatusCode::FOUND
            | StatusCode::SEE_OTHER
            | StatusCode::TEMPORARY_REDIRECT
            | StatusCode::PERMANENT_REDIRECT
    ) {
        return None;
    }
    let location = response.headers().get(header::LOCATION)?.to_str().ok()?;
    resolve_location(current, location.trim())
}

/// Resolve a `Location` value against `base`
pub fn resolve_location(base: &Uri, location: &str) -> Option<Uri> {
    if location.is_empty() {
        return None;
    }
    let scheme = base.scheme_str().unwrap_or("http");
    let resolved = if location.starts_with("//") {
        format!("{scheme}:{location}")
    } else if location.starts_with('/') {
        format!("{scheme}://{}{location}", base.authority()?)
    } else if location.contains("://") {
        location.to_string()
    } else {
        let path = base.path();
        let dir = &path[..path.rfind('/').map_or(0, |i| i + 1)];
        let dir = if dir.is_empty() { "/" } else { dir };
        format!("{scheme}://{}{dir}{location}", base.authority()?)
    };
    resolved.parse().ok()
}

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(&name.as_str())
}

/// Copy upstream headers minus hop-by-hop headers and any named in `also_skip`
pub fn forwardable_headers(upstream: &HeaderMap, also_skip: &[HeaderName]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in upstream {
        if is_hop_by_hop(name) || also_skip.contains(name) {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }
    headers
}
