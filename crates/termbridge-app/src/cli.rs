use std::path::PathBuf;

use clap::{Parser, Subcommand};
use termbridge_config::validation::is_ws_url;
use termbridge_config::TermbridgeConfig;

/// termbridge: attach this terminal to a remote shell or a local sandbox.
#[derive(Parser, Debug)]
#[command(name = "termbridge", version, about)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter override (e.g. debug, termbridge_bridge=trace).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Columns to use when the host terminal size is unknown.
    #[arg(long, global = true)]
    pub cols: Option<u16>,

    /// Rows to use when the host terminal size is unknown.
    #[arg(long, global = true)]
    pub rows: Option<u16>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Connect to a shell server over WebSocket.
    Remote {
        /// Endpoint URL. Overrides config and TERMBRIDGE_REMOTE_URL.
        #[arg(long)]
        url: Option<String>,
    },
    /// Start a shell in the local sandbox container.
    Sandbox,
}

pub fn parse() -> Args {
    Args::parse()
}

/// Fold command-line overrides into the loaded config.
pub fn apply_overrides(config: &mut TermbridgeConfig, args: &Args) -> Result<(), String> {
    if let Command::Remote { url: Some(url) } = &args.command {
        if !is_ws_url(url) {
            return Err(format!("--url must be a ws:// or wss:// URL, got '{url}'"));
        }
        config.remote.url = url.clone();
    }
    if let Some(cols) = args.cols {
        if cols == 0 {
            return Err("--cols must be at least 1".into());
        }
        config.terminal.cols = cols;
    }
    if let Some(rows) = args.rows {
        if rows == 0 {
            return Err("--rows must be at least 1".into());
        }
        config.terminal.rows = rows;
    }
    Ok(())
}
