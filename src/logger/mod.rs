//! Logger module
//!
//! Provides logging utilities for the server including:
//! - Server lifecycle logging
//! - Access logging with multiple formats
//! - Proxy, patch and browser-log diagnostics
//! - Error and warning logging

mod format;
pub mod writer;

pub use format::AccessLogEntry;

use crate::config::Config;
use hyper::Method;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};

const LEVEL_DEBUG: u8 = 0;
const LEVEL_INFO: u8 = 1;
const LEVEL_WARN: u8 = 2;
const LEVEL_ERROR: u8 = 3;

static LEVEL: AtomicU8 = AtomicU8::new(LEVEL_INFO);

/// Initialize the logger with configuration
///
/// Should be called once at application startup.
pub fn init(config: &Config) -> std::io::Result<()> {
    set_level(&config.logging.level);
    writer::init(
        config.logging.access_log_file.as_deref(),
        config.logging.error_log_file.as_deref(),
    )
}

/// Set the minimum level; unknown names fall back to `info`
pub fn set_level(level: &str) {
    let value = match level.trim().to_ascii_lowercase().as_str() {
        "debug" | "trace" => LEVEL_DEBUG,
        "warn" | "warning" => LEVEL_WARN,
        "error" => LEVEL_ERROR,
        _ => LEVEL_INFO,
    };
    LEVEL.store(value, Ordering::Relaxed);
}

fn enabled(level: u8) -> bool {
    level >= LEVEL.load(Ordering::Relaxed)
}

fn write_info(message: &str) {
    if !enabled(LEVEL_INFO) {
        return;
    }
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

fn write_error(message: &str) {
    match writer::get() {
        Some(w) => w.write_error(message),
        None => eprintln!("{message}"),
    }
}

fn write_access(message: &str) {
    match writer::get() {
        Some(w) => w.write_access(message),
        None => println!("{message}"),
    }
}

pub fn log_server_start(addr: &SocketAddr, config: &Config, cors: &str) {
    write_info("======================================");
    write_info("shimserve started");
    write_info(&format!("Listening on: http://{addr}"));
    write_info(&format!("Serving: {}", config.site.root));
    for route in &config.proxy.routes {
        let patch = if route.patch { " (patched)" } else { "" };
        write_info(&format!("Proxy: {} -> {}{patch}", route.prefix, route.upstream));
    }
    write_info(&format!("CORS: {cors}"));
    write_info(&format!("Client log: {}", config.site.client_log_file));
    write_info(&format!("Log level: {}", config.logging.level));
    if let Some(workers) = config.server.workers {
        write_info(&format!("Worker threads: {workers}"));
    }
    if let Some(ref path) = config.logging.access_log_file {
        write_info(&format!("Access log: {path}"));
    }
    if let Some(ref path) = config.logging.error_log_file {
        write_info(&format!("Error log: {path}"));
    }
    write_info("======================================\n");
}

pub fn log_signal(name: &str) {
    write_info(&format!("[SIGNAL] {name} received, shutting down"));
}

pub fn log_shutdown() {
    write_info("[INFO] Listener closed");
}

pub fn log_connection_error(err: &impl std::fmt::Display) {
    if enabled(LEVEL_ERROR) {
        write_error(&format!("[ERROR] Failed to serve connection: {err}"));
    }
}

pub fn log_debug(message: &str) {
    if enabled(LEVEL_DEBUG) {
        write_error(&format!("[DEBUG] {message}"));
    }
}

pub fn log_warning(message: &str) {
    if enabled(LEVEL_WARN) {
        write_error(&format!("[WARN] {message}"));
    }
}

pub fn log_error(message: &str) {
    if enabled(LEVEL_ERROR) {
        write_error(&format!("[ERROR] {message}"));
    }
}

pub fn log_proxy(method: &Method, url: &str) {
    write_info(&format!("[PROXY] {method} {url}"));
}

/// First outcome of a rewriting rule
pub fn log_patch_outcome(rule: &str, matched: bool, used_fallback: bool) {
    match (matched, used_fallback) {
        (true, false) => write_info(&format!("[PATCH] {rule}: applied")),
        (true, true) => write_info(&format!("[PATCH] {rule}: applied via pattern fallback")),
        (false, _) if enabled(LEVEL_WARN) => write_error(&format!(
            "[PATCH] {rule}: target not found, serving without shim"
        )),
        (false, _) => {}
    }
}

pub fn log_browser(message: &str) {
    write_info(&format!("[BROWSER LOG] {message}"));
}

/// Log formatted access log entry
pub fn log_access(entry: &AccessLogEntry, format: &str) {
    write_access(&entry.format(format));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_names() {
        set_level("WARNING");
        assert!(!enabled(LEVEL_INFO));
        assert!(enabled(LEVEL_ERROR));
        set_level("nonsense");
        assert!(enabled(LEVEL_INFO));
        assert!(!enabled(LEVEL_DEBUG));
        set_level("info");
    }
}
