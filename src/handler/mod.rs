//! Request handler module
//!
//! Routing dispatch plus the serving subsystems: local files and listings,
//! the upstream proxy, and the browser log sink.

pub mod client_log;
pub mod listing;
pub mod proxy;
pub mod resolver;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use router::{handle_request, RequestContext};
