//! CORS policy module
//!
//! The policy is fixed at startup from configuration (`NODE_ENV` / `CORS_ORIGINS`).
//! An explicit allow-list, when present, always decides. Without one, any origin is
//! echoed back outside production and none in production.

use crate::config::CorsConfig;
use hyper::header::{self, HeaderMap, HeaderValue};

const ALLOW_METHODS: &str = "GET, HEAD, OPTIONS, POST";
const ALLOW_HEADERS: &str = "X-Requested-With, Content-Type, Origin, Authorization, Accept, \
                             Client-Security-Token, Accept-Encoding, Range";
const EXPOSE_HEADERS: &str = "Content-Range, Content-Length, Accept-Ranges";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorsPolicy {
    production: bool,
    allowed_origins: Vec<String>,
}

impl CorsPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            production: config.production,
            allowed_origins: config
                .allowed_origins
                .iter()
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    /// Origin to echo in `Access-Control-Allow-Origin`, if the request's origin is admitted
    pub fn allow_origin<'a>(&self, origin: Option<&'a str>) -> Option<&'a str> {
        let origin = origin?;
        if !self.allowed_origins.is_empty() {
            return self
                .allowed_origins
                .iter()
                .any(|o| o == origin)
                .then_some(origin);
        }
        (!self.production).then_some(origin)
    }

    /// Add the CORS header set to a response
    pub fn apply(&self, origin: Option<&str>, headers: &mut HeaderMap) {
        if let Some(value) = self
            .allow_origin(origin)
            .and_then(|o| HeaderValue::from_str(o).ok())
        {
            headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
            headers.append(header::VARY, HeaderValue::from_static("Origin"));
        }
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(ALLOW_METHODS),
        );
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(ALLOW_HEADERS),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static(EXPOSE_HEADERS),
        );
    }

    /// Short description for the startup banner
    pub fn describe(&self) -> String {
        if !self.allowed_origins.is_empty() {
            format!("allow-list ({})", self.allowed_origins.join(", "))
        } else if self.production {
            "production (no cross-origin access)".to_string()
        } else {
            "open (any origin)".to_string()
        }
    }
}
