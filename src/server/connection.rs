// Connection handling module
// Accepts a single TCP connection and serves it on its own task

use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::config::AppState;
use crate::handler;
use crate::logger;

/// Accept a connection if under the connection limit and serve it
///
/// The counter is incremented before the limit check so two racing accepts
/// cannot both slip under the limit.
pub fn accept_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: &Arc<AppState>,
    conn_counter: &Arc<AtomicUsize>,
) {
    let prev_count = conn_counter.fetch_add(1, Ordering::SeqCst);

    if let Some(max_conn) = state.config.performance.max_connections {
        if prev_count >= usize::try_from(max_conn).unwrap_or(usize::MAX) {
            conn_counter.fetch_sub(1, Ordering::SeqCst);
            logger::log_warning(&format!(
                "Max connections reached: {prev_count}/{max_conn}. Connection from {peer_addr} rejected."
            ));
            drop(stream);
            return;
        }
    }

    logger::log_debug(&format!("Accepted connection from {peer_addr}"));
    handle_connection(
        stream,
        peer_addr,
        Arc::clone(state),
        Arc::clone(conn_counter),
    );
}

/// Serve one connection on a spawned task
///
/// Only the wait for request headers is bounded by `read_timeout`; response
/// bodies may stream for as long as the client keeps reading.
fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
    conn_counter: Arc<AtomicUsize>,
) {
    tokio::spawn(async move {
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);

        let read_timeout = Duration::from_secs(state.config.performance.read_timeout.max(1));
        let mut builder = http1::Builder::new();
        builder
            .keep_alive(state.config.performance.keep_alive)
            .timer(TokioTimer::new())
            .header_read_timeout(read_timeout);

        let conn = builder.serve_connection(
            io,
            service_fn(move |req| handler::handle_request(req, Arc::clone(&state), peer_addr)),
        );

        if let Err(err) = conn.await {
            if is_client_disconnect(&err) {
                logger::log_debug(&format!("Client {peer_addr} went away: {err}"));
            } else {
                logger::log_connection_error(&err);
            }
        }

        conn_counter.fetch_sub(1, Ordering::SeqCst);
    });
}

/// Errors caused by the peer closing mid-exchange
fn is_client_disconnect(err: &hyper::Error) -> bool {
    if err.is_incomplete_message() || err.is_canceled() || err.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            return matches!(
                io.kind(),
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            );
        }
        source = e.source();
    }
    false
}
