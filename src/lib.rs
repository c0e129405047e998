//! shimserve: a development web server for in-browser Java runtimes
//!
//! Serves a local tree with byte-range support, synthesizes directory listings,
//! and proxies the runtime's CDN with on-the-fly shims for known defects.

pub mod config;
pub mod handler;
pub mod http;
pub mod logger;
pub mod proxy;
pub mod server;
