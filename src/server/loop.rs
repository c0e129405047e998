// Server loop module
// Accepts connections until shutdown is signalled

use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use super::connection::accept_connection;
use crate::config::AppState;
use crate::logger;

/// Accept connections on `listener` until `shutdown` is notified
///
/// Accept errors (e.g. descriptor exhaustion) are logged and the loop continues.
/// Connections already being served are not awaited on shutdown.
#[allow(clippy::ignored_unit_patterns)]
pub async fn run(listener: TcpListener, state: Arc<AppState>, shutdown: Arc<Notify>) {
    let active_connections = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, peer_addr)) => {
                        accept_connection(stream, peer_addr, &state, &active_connections);
                    }
                    Err(e) => {
                        logger::log_error(&format!("Failed to accept connection: {e}"));
                    }
                }
            }

            _ = shutdown.notified() => {
                logger::log_shutdown();
                break;
            }
        }
    }
}
