use std::sync::Arc;

use async_trait::async_trait;
use termbridge_common::{
    BackendKind, BridgeError, BridgePhase, ConnectionState, SandboxError, TermSize,
};
use termbridge_config::schema::SandboxConfig;

use super::container::{ProcessOutput, SpawnRequest};
use super::service::SandboxService;
use crate::isolation::{self, IsolationCheck};
use crate::notices;
use crate::session::SessionEnd;
use crate::surface::{SurfaceEvent, SurfaceHandle};
use crate::utf8::Utf8Decoder;
use crate::view::{Backend, BridgeLink};

/// Bridges a surface to a shell spawned in the shared sandbox container.
///
/// Every mount spawns its own shell process. Unmount kills that shell but
/// leaves the container running for the next view.
pub struct SandboxBackend {
    service: Arc<SandboxService>,
    program: String,
    args: Vec<String>,
    isolation: IsolationCheck,
}

impl SandboxBackend {
    pub fn new(service: Arc<SandboxService>, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            service,
            program: program.into(),
            args,
            isolation: isolation::always_satisfied(),
        }
    }

    pub fn from_config(service: Arc<SandboxService>, config: &SandboxConfig) -> Self {
        let shell = SpawnRequest::from_config(config, TermSize::default());
        Self {
            service,
            program: shell.program,
            args: shell.args,
            isolation: isolation::environment_isolation(config.isolate_env),
        }
    }

    pub fn with_isolation(mut self, check: IsolationCheck) -> Self {
        self.isolation = check;
        self
    }
}

#[async_trait]
impl Backend for SandboxBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sandbox
    }

    async fn run(&self, link: BridgeLink) -> Result<(), BridgeError> {
        link.report_isolation(&self.isolation);

        let BridgeLink {
            session,
            surface,
            mut events,
            cancel,
        } = link;

        surface.write(notices::BOOTING_SANDBOX);
        let container = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
            result = self.service.container() => result?,
        };

        surface.write(notices::STARTING_SHELL);
        let size = surface.size();
        session.set_size(size);
        let request = SpawnRequest::new(self.program.clone(), self.args.clone(), size);
        let mut process = tokio::select! {
            _ = cancel.cancelled() => return Err(BridgeError::Cancelled),
            result = container.spawn(request) => result?,
        };
        let Some(mut output) = process.take_output() else {
            let _ = process.kill();
            return Err(SandboxError::Process("shell output stream unavailable".into()).into());
        };

        session.set_connection(ConnectionState::Connected);
        session.set_phase(BridgePhase::Ready);
        surface.write(notices::SHELL_READY);
        tracing::info!(
            session = session.id().short(),
            container = container.name(),
            pid = ?process.pid(),
            "sandbox shell attached"
        );

        let mut decoder = Utf8Decoder::new();
        let mut events_open = true;
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    if let Err(e) = process.kill() {
                        tracing::warn!(session = session.id().short(), error = %e, "failed to kill sandbox shell");
                    }
                    return Ok(());
                }

                chunk = output.recv() => match chunk {
                    Some(ProcessOutput::Data(bytes)) => {
                        surface.write(&decoder.decode(&bytes));
                    }
                    Some(ProcessOutput::Exited(code)) => {
                        finish(&surface, &mut decoder, code);
                        tracing::info!(session = session.id().short(), ?code, "sandbox shell exited");
                        session.settle(SessionEnd::Exited(code));
                        return Ok(());
                    }
                    None => {
                        finish(&surface, &mut decoder, None);
                        session.settle(SessionEnd::Exited(None));
                        return Ok(());
                    }
                },

                event = events.recv(), if events_open => match event {
                    Some(SurfaceEvent::Input(bytes)) => {
                        if let Err(e) = process.write(&bytes) {
                            tracing::debug!(session = session.id().short(), error = %e, "input dropped");
                        }
                    }
                    Some(SurfaceEvent::Resize(size)) => {
                        session.set_size(size);
                        if let Err(e) = process.resize(size) {
                            tracing::warn!(session = session.id().short(), error = %e, "resize failed");
                        }
                    }
                    None => events_open = false,
                },
            }
        }
    }
}

fn finish(surface: &SurfaceHandle, decoder: &mut Utf8Decoder, code: Option<u32>) {
    let tail = decoder.finish();
    if !tail.is_empty() {
        surface.write(&tail);
    }
    surface.write(&notices::process_exited(code));
}
