//! Process-hosting container abstraction.

use std::sync::Arc;

use async_trait::async_trait;
use termbridge_common::{SandboxError, TermSize};
use termbridge_config::schema::SandboxConfig;
use tokio::sync::mpsc;

/// What a spawned shell produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutput {
    Data(Vec<u8>),
    /// Always the last item. `None` if the exit status is unknown.
    Exited(Option<u32>),
}

/// Request for an interactive shell inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpawnRequest {
    pub program: String,
    pub args: Vec<String>,
    pub size: TermSize,
}

impl SpawnRequest {
    pub fn new(program: impl Into<String>, args: Vec<String>, size: TermSize) -> Self {
        Self {
            program: program.into(),
            args,
            size,
        }
    }

    /// Shell command from config. An empty program means the user's default
    /// shell, started as a login shell on Unix.
    pub fn from_config(config: &SandboxConfig, size: TermSize) -> Self {
        if config.program.trim().is_empty() {
            let args = if cfg!(unix) && config.args.is_empty() {
                vec!["-l".to_string()]
            } else {
                config.args.clone()
            };
            Self::new(default_shell(), args, size)
        } else {
            Self::new(config.program.clone(), config.args.clone(), size)
        }
    }
}

/// Get the user's default shell.
///
/// - Unix: reads `$SHELL`, falls back to `/bin/sh`
/// - Windows: reads `$COMSPEC`, falls back to `cmd.exe`
pub fn default_shell() -> String {
    #[cfg(unix)]
    {
        std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
    }
    #[cfg(windows)]
    {
        std::env::var("COMSPEC").unwrap_or_else(|_| "cmd.exe".to_string())
    }
}

/// A running shell. Dropping it without `kill` leaves cleanup to the
/// implementation.
pub trait ShellProcess: Send {
    fn pid(&self) -> Option<u32>;

    /// Take the output stream. Single consumer; later calls return `None`.
    fn take_output(&mut self) -> Option<mpsc::UnboundedReceiver<ProcessOutput>>;

    /// Queue input bytes. Does not wait for the write to complete, but
    /// preserves order across calls.
    fn write(&mut self, data: &[u8]) -> Result<(), SandboxError>;

    fn resize(&mut self, size: TermSize) -> Result<(), SandboxError>;

    fn kill(&mut self) -> Result<(), SandboxError>;
}

/// A booted process host, shared by every session.
#[async_trait]
pub trait Container: Send + Sync {
    fn name(&self) -> &str;

    async fn spawn(&self, request: SpawnRequest) -> Result<Box<dyn ShellProcess>, SandboxError>;

    /// Release the container and everything still running in it.
    async fn teardown(&self);
}

/// Boots a container. Called at most once per successful boot by
/// [`super::SandboxService`].
#[async_trait]
pub trait ContainerBooter: Send + Sync {
    async fn boot(&self) -> Result<Arc<dyn Container>, SandboxError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_shell_returns_nonempty() {
        assert!(!default_shell().is_empty());
    }

    #[test]
    fn explicit_program_is_used_verbatim() {
        let config = SandboxConfig {
            program: "/bin/bash".into(),
            args: vec!["--norc".into()],
            ..SandboxConfig::default()
        };
        let req = SpawnRequest::from_config(&config, TermSize::new(100, 30));
        assert_eq!(req.program, "/bin/bash");
        assert_eq!(req.args, vec!["--norc".to_string()]);
        assert_eq!(req.size, TermSize::new(100, 30));
    }

    #[cfg(unix)]
    #[test]
    fn auto_detected_shell_is_a_login_shell() {
        let req = SpawnRequest::from_config(&SandboxConfig::default(), TermSize::default());
        assert_eq!(req.program, default_shell());
        assert_eq!(req.args, vec!["-l".to_string()]);
    }
}
