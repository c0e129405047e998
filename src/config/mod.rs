// Configuration module entry point
// Manages application configuration and runtime state

mod state;
mod types;

use std::net::SocketAddr;
use std::path::PathBuf;

// Re-export public types
pub use state::AppState;
pub use types::{
    AliasRule, Config, CorsConfig, HttpConfig, LoggingConfig, PerformanceConfig, ProxyConfig,
    ProxyRoute, ServerConfig, SiteConfig, StubRule,
};

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Layering, lowest to highest: built-in defaults, the config file (optional),
    /// `SHIMSERVE_<SECTION>__<KEY>` variables, then the legacy `PORT`, `NODE_ENV`
    /// and `CORS_ORIGINS` variables.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("SHIMSERVE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.apply_legacy_env(|key| std::env::var(key).ok());
        Ok(cfg)
    }

    /// Apply `PORT`, `NODE_ENV` and `CORS_ORIGINS` as looked up by `var`
    pub fn apply_legacy_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(port) = var("PORT").and_then(|p| p.trim().parse().ok()) {
            self.server.port = port;
        }
        if let Some(mode) = var("NODE_ENV") {
            self.cors.production = mode.trim().eq_ignore_ascii_case("production");
        }
        if let Some(origins) = var("CORS_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(ToString::to_string)
                .collect();
            if !origins.is_empty() {
                self.cors.allowed_origins = origins;
            }
        }
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        let host = self.server.host.trim_start_matches('[').trim_end_matches(']');
        let addr = if host.contains(':') {
            format!("[{host}]:{}", self.server.port)
        } else {
            format!("{host}:{}", self.server.port)
        };
        addr.parse().map_err(|e| format!("Invalid address: {e}"))
    }

    /// Site root as a path
    pub fn root_path(&self) -> PathBuf {
        PathBuf::from(&self.site.root)
    }
}
