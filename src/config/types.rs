// Configuration types module
// Defines all configuration-related data structures

use serde::Deserialize;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub site: SiteConfig,
    pub proxy: ProxyConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            workers: None,
        }
    }
}

/// Local site configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SiteConfig {
    /// Directory served at `/`
    pub root: String,
    /// Resource name that synthesizes a plain-text listing of its directory
    pub listing_name: String,
    pub index_files: Vec<String>,
    /// HTML page for directories without an index file
    pub autoindex: bool,
    /// Path accepting `POST`ed client log lines
    pub log_endpoint: String,
    pub client_log_file: String,
    pub stubs: Vec<StubRule>,
    pub aliases: Vec<AliasRule>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: ".".to_string(),
            listing_name: "index.list".to_string(),
            index_files: vec!["index.html".to_string(), "index.htm".to_string()],
            autoindex: true,
            log_endpoint: "/log".to_string(),
            client_log_file: "starsector_browser.log".to_string(),
            stubs: default_stubs(),
            aliases: Vec::new(),
        }
    }
}

/// Virtual fixed-content resource
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct StubRule {
    /// Matches paths ending with this text
    #[serde(default)]
    pub suffix: Option<String>,
    /// Matches paths containing this text
    #[serde(default)]
    pub contains: Option<String>,
    pub body: String,
    pub content_type: String,
}

impl StubRule {
    pub fn matches(&self, path: &str) -> bool {
        self.suffix.as_deref().is_some_and(|s| path.ends_with(s))
            || self.contains.as_deref().is_some_and(|c| path.contains(c))
    }
}

const LOG4J_XML_STUB: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE log4j:configuration SYSTEM "log4j.dtd">
<log4j:configuration xmlns:log4j="http://jakarta.apache.org/log4j/">
  <appender name="console" class="org.apache.log4j.ConsoleAppender">
    <layout class="org.apache.log4j.PatternLayout">
      <param name="ConversionPattern" value="%d{ISO8601} [%t] %-5p %c %x - %m%n"/>
    </layout>
  </appender>
  <root>
    <priority value="info"/>
    <appender-ref ref="console"/>
  </root>
</log4j:configuration>
"#;

fn default_stubs() -> Vec<StubRule> {
    vec![
        StubRule {
            suffix: Some("/log4j.xml".to_string()),
            contains: None,
            body: LOG4J_XML_STUB.to_string(),
            content_type: "text/xml; charset=utf-8".to_string(),
        },
        StubRule {
            suffix: None,
            contains: Some("/META-INF/services/".to_string()),
            body: "\n".to_string(),
            content_type: "text/plain; charset=utf-8".to_string(),
        },
        StubRule {
            suffix: Some("/.launching".to_string()),
            contains: None,
            body: "\n".to_string(),
            content_type: "application/octet-stream".to_string(),
        },
    ]
}

/// Fallback location for files missing under `prefix`
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct AliasRule {
    pub prefix: String,
    pub fallback_prefix: String,
}

/// Upstream proxy configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    /// Checked in order, first prefix match wins
    pub routes: Vec<ProxyRoute>,
    /// Seconds allowed for connect + response head, and again for buffering a body
    pub upstream_timeout: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            routes: vec![
                ProxyRoute {
                    prefix: "/cheerpj/4.2/".to_string(),
                    upstream: "https://cjrtnc.leaningtech.com/4.2/".to_string(),
                    local_override: None,
                    patch: true,
                },
                ProxyRoute {
                    prefix: "/cheerpj-3.0/".to_string(),
                    upstream: "https://cjrtnc.leaningtech.com/3.0/".to_string(),
                    local_override: Some("cheerpj-3.0".to_string()),
                    patch: false,
                },
            ],
            upstream_timeout: 30,
        }
    }
}

/// Path prefix forwarded to a single upstream origin
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProxyRoute {
    pub prefix: String,
    /// Base URL the remainder after `prefix` is appended to
    pub upstream: String,
    /// Directory (relative to the site root) consulted before the network
    #[serde(default)]
    pub local_override: Option<String>,
    /// Rewrite resources matching a patch rule
    #[serde(default)]
    pub patch: bool,
}

/// CORS configuration, normally driven by `NODE_ENV` / `CORS_ORIGINS`
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct CorsConfig {
    pub production: bool,
    pub allowed_origins: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub access_log: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub keep_alive: bool,
    /// Seconds to wait for a request head
    pub read_timeout: u64,
    pub max_connections: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            read_timeout: 30,
            max_connections: Some(1024),
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub server_name: String,
    pub max_body_size: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: "shimserve".to_string(),
            max_body_size: 1_048_576, // 1MB
        }
    }
}
