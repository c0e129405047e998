use clap::Parser;
use shimserve::config::{AppState, Config};
use shimserve::{logger, server};
use std::sync::Arc;
use tokio::sync::Notify;

/// Development server for the in-browser game client
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Port to listen on (overrides config and PORT)
    port: Option<u16>,
    /// Address to bind
    #[arg(long)]
    host: Option<String>,
    /// Directory to serve
    #[arg(long)]
    root: Option<String>,
    /// Config file path, without extension
    #[arg(long, default_value = "config")]
    config: String,
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    let mut cfg = Config::load_from(&cli.config)?;
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }
    if let Some(host) = cli.host {
        cfg.server.host = host;
    }
    if let Some(root) = cli.root {
        cfg.site.root = root;
    }

    logger::init(&cfg)?;

    let mut runtime_builder = tokio::runtime::Builder::new_multi_thread();
    runtime_builder.enable_all();
    if let Some(workers) = cfg.server.workers {
        runtime_builder.worker_threads(workers);
    }
    let runtime = runtime_builder.build()?;

    runtime.block_on(async_main(cfg))
}

async fn async_main(cfg: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = cfg.get_socket_addr()?;
    let listener = match server::create_listener(addr) {
        Ok(l) => l,
        Err(e) => {
            logger::log_error(&format!("Failed to bind {addr}: {e}"));
            return Err(e.into());
        }
    };

    let state = Arc::new(AppState::new(cfg)?);
    logger::log_server_start(&addr, &state.config, &state.cors.describe());

    let shutdown = Arc::new(Notify::new());
    server::start_signal_handler(Arc::clone(&shutdown))?;
    server::run(listener, state, shutdown).await;
    Ok(())
}
