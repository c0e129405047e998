// Signal handling module
//
// SIGTERM and SIGINT (Ctrl+C) stop the accept loop.

use std::sync::Arc;
use tokio::sync::Notify;

/// Spawn a task that notifies `shutdown` on SIGTERM or SIGINT
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => crate::logger::log_signal("SIGTERM"),
            _ = sigint.recv() => crate::logger::log_signal("SIGINT"),
        }
        shutdown.notify_one();
    });
    Ok(())
}

/// Ctrl+C only outside Unix
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Notify>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            crate::logger::log_signal("Ctrl+C");
            shutdown.notify_one();
        }
    });
    Ok(())
}
