mod cli;
mod guard;
mod logging;
mod stdio_surface;

use std::process::ExitCode;
use std::sync::Arc;

use termbridge_bridge::remote::RemoteBackend;
use termbridge_bridge::sandbox::{PtyBooter, SandboxBackend, SandboxService};
use termbridge_bridge::{Backend, TerminalView};
use termbridge_common::{BridgeError, SurfaceError, TermSize};
use termbridge_config::TermbridgeConfig;

use crate::cli::{Args, Command};
use crate::guard::RawModeGuard;
use crate::stdio_surface::StdioSurface;

fn load_config(args: &Args) -> (TermbridgeConfig, Option<String>) {
    let loaded = match &args.config {
        Some(path) => termbridge_config::load_config_from(path),
        None => termbridge_config::load_config(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (TermbridgeConfig::default(), Some(e.to_string())),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();

    let (mut config, config_error) = load_config(&args);
    if let Err(e) = cli::apply_overrides(&mut config, &args) {
        eprintln!("termbridge: {e}");
        return ExitCode::from(2);
    }

    if let Err(e) = logging::init(&config.logging, args.log_level.as_deref()) {
        eprintln!("termbridge: logging disabled: {e}");
    }

    tracing::info!("termbridge v{} starting...", env!("CARGO_PKG_VERSION"));
    if let Some(path) = &args.config {
        tracing::info!("Using config override: {}", path.display());
    }
    if let Some(e) = config_error {
        tracing::warn!("Config load failed, using defaults: {e}");
        eprintln!("termbridge: config load failed, using defaults: {e}");
    }

    match run(args.command, config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "termbridge failed");
            eprintln!("termbridge: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: TermbridgeConfig) -> Result<(), BridgeError> {
    let mut sandbox = None;
    let backend: Arc<dyn Backend> = match command {
        Command::Remote { .. } => {
            tracing::info!(url = %config.remote.url, "remote session");
            Arc::new(RemoteBackend::from_config(&config))
        }
        Command::Sandbox => {
            let service = SandboxService::new(Arc::new(PtyBooter::from_config(&config.sandbox)));
            sandbox = Some(Arc::clone(&service));
            Arc::new(SandboxBackend::from_config(service, &config.sandbox))
        }
    };

    let fallback = Some(TermSize::new(config.terminal.cols, config.terminal.rows))
        .filter(TermSize::is_valid)
        .unwrap_or_default();
    let detach_byte = config.terminal.detach_byte();
    let (surface, detach) = StdioSurface::new(fallback, detach_byte)
        .map_err(SurfaceError::from)?;

    let raw_mode = RawModeGuard::enable().map_err(SurfaceError::from)?;
    if detach_byte.is_some() {
        eprint!(
            "Attached. Press Ctrl+{} to detach.\r\n",
            config.terminal.detach_key
        );
    }

    let mut view = TerminalView::new(backend, Box::new(surface));
    if !view.mount()? {
        return Err(BridgeError::AlreadyMounted);
    }

    tokio::select! {
        _ = detach.wait() => tracing::info!("detached by user"),
        end = view.wait_until_settled() => tracing::info!(?end, "session ended"),
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted"),
    }

    view.unmount().await;
    if let Some(service) = sandbox {
        service.shutdown().await;
    }
    drop(raw_mode);
    Ok(())
}
