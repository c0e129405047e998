//! Browser log sink module
//!
//! The in-browser runtime POSTs diagnostic text to the log endpoint; each body is
//! appended to the client log file as one line.

use crate::http::{self, Body};
use crate::logger;
use hyper::{Response, StatusCode};
use std::path::PathBuf;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only client log file; appends from concurrent requests are serialized
#[derive(Debug)]
pub struct ClientLog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ClientLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Append `line` followed by a newline
    pub async fn append(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');
        file.write_all(record.as_bytes()).await?;
        file.flush().await
    }
}

/// Handle a POST to the log endpoint
///
/// Always answers `200 Logged`; a body that is not UTF-8 or cannot be written is
/// reported in the server log only.
pub async fn handle_log_post(log: &ClientLog, body: &[u8]) -> Response<Body> {
    match std::str::from_utf8(body) {
        Ok(text) => {
            logger::log_browser(text);
            if let Err(e) = log.append(text).await {
                logger::log_error(&format!(
                    "Failed to write client log '{}': {e}",
                    log.path().display()
                ));
            }
        }
        Err(e) => {
            logger::log_warning(&format!("Discarding non-UTF-8 client log body: {e}"));
        }
    }
    http::build_text_response(StatusCode::OK, "Logged")
}
