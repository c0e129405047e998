// Application state module
// Process-wide, read-only after startup apart from the patch records and client log

use std::path::PathBuf;

use super::types::Config;
use crate::handler::client_log::ClientLog;
use crate::http::cors::CorsPolicy;
use crate::proxy::{ContentPatcher, ProxyFetcher};

/// Application state shared by every connection task
pub struct AppState {
    pub config: Config,
    pub root: PathBuf,
    pub cors: CorsPolicy,
    pub fetcher: ProxyFetcher,
    pub patcher: ContentPatcher,
    pub client_log: ClientLog,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, Box<dyn std::error::Error + Send + Sync>> {
        let root = config.root_path();
        let cors = CorsPolicy::new(&config.cors);
        let fetcher = ProxyFetcher::new(&config.proxy);
        let patcher = ContentPatcher::builtin()?;
        let client_log = ClientLog::new(&config.site.client_log_file);

        Ok(Self {
            config,
            root,
            cors,
            fetcher,
            patcher,
            client_log,
        })
    }
}
