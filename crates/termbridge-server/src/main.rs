//! termbridge-server: WebSocket shell server for the remote backend.
//!
//! Accepts WebSocket connections and gives each one its own shell, spawned
//! in a PTY container that is booted once per server process. Speaks the
//! same wire protocol as the client: raw input frames plus a JSON resize
//! message.

mod connection;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use termbridge_bridge::sandbox::{PtyBooter, SandboxService, SpawnRequest};
use termbridge_common::TermSize;
use termbridge_config::TermbridgeConfig;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_async;
use tracing_subscriber::EnvFilter;

use crate::connection::handle_connection;

const FALLBACK_DIRECTIVE: &str = "termbridge=info";

#[derive(Parser)]
#[command(name = "termbridge-server", version, about = "WebSocket shell server for termbridge")]
struct Args {
    /// Address to listen on. Overrides `[server] bind`.
    #[arg(short, long)]
    bind: Option<String>,

    /// Config file path override.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log filter override (e.g. debug, termbridge_server=trace).
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter = match args.log_level.as_deref() {
        Some(directive) => EnvFilter::try_new(directive)
            .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE)),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(FALLBACK_DIRECTIVE)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .init();

    let loaded = match &args.config {
        Some(path) => termbridge_config::load_config_from(path),
        None => termbridge_config::load_config(),
    };
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        TermbridgeConfig::default()
    });

    let addr = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind TCP listener");
            return ExitCode::FAILURE;
        }
    };

    let service = SandboxService::new(Arc::new(PtyBooter::from_config(&config.sandbox)));
    let shell = SpawnRequest::from_config(
        &config.sandbox,
        Some(TermSize::new(config.terminal.cols, config.terminal.rows))
            .filter(TermSize::is_valid)
            .unwrap_or_default(),
    );

    tracing::info!(
        %addr,
        shell = %shell.program,
        "termbridge-server v{} listening",
        env!("CARGO_PKG_VERSION")
    );

    // Accept loop.
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let service = Arc::clone(&service);
                    let shell = shell.clone();
                    tokio::spawn(async move {
                        match accept_async(stream).await {
                            Ok(ws) => handle_connection(ws, peer, service, shell).await,
                            Err(e) => {
                                tracing::warn!(%peer, error = %e, "WS handshake failed");
                            }
                        }
                    });
                }
                Err(e) => {
                    tracing::warn!(error = %e, "TCP accept error");
                }
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
        }
    }

    service.shutdown().await;
    ExitCode::SUCCESS
}
