//! PTY-backed container: shells run under `portable-pty`, rooted at a
//! sandbox directory with a sanitized environment.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use async_trait::async_trait;
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, MasterPty, PtySize};
use termbridge_common::{SandboxError, TermSize};
use termbridge_config::schema::SandboxConfig;
use tokio::sync::mpsc;

use super::container::{Container, ContainerBooter, ProcessOutput, ShellProcess, SpawnRequest};

// =============================================================================
// CONSTANTS
// =============================================================================

/// Maximum bytes to read from a PTY in one call (8 KB).
pub const PTY_READ_CHUNK: usize = 8_192;

/// Allowed environment variables to inherit when `isolate_env` is on.
///
/// A minimal set, so host secrets (API keys, tokens, etc.) stay out of
/// sandbox shells.
const ALLOWED_ENV_VARS: &[&str] = &[
    "HOME",
    "USER",
    "LOGNAME",
    "SHELL",
    "PATH",
    "TERM",
    "LANG",
    "LC_ALL",
    "LC_CTYPE",
    "TMPDIR",
    "TMP",
    "TEMP",
    // Windows-specific
    "USERPROFILE",
    "APPDATA",
    "LOCALAPPDATA",
    "SYSTEMROOT",
    "COMSPEC",
    "HOMEDRIVE",
    "HOMEPATH",
];

/// Kill handles for shells that have not been reaped yet, keyed by spawn
/// sequence number.
type Killers = Arc<Mutex<HashMap<u64, Box<dyn ChildKiller + Send + Sync>>>>;

fn lock_killers(
    killers: &Killers,
) -> MutexGuard<'_, HashMap<u64, Box<dyn ChildKiller + Send + Sync>>> {
    killers.lock().unwrap_or_else(PoisonError::into_inner)
}

fn pty_size(size: TermSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

// =============================================================================
// BOOTER
// =============================================================================

/// Boots a [`PtyContainer`] from the `[sandbox]` config section.
pub struct PtyBooter {
    root: PathBuf,
    isolate_env: bool,
    env: HashMap<String, String>,
}

impl PtyBooter {
    pub fn from_config(config: &SandboxConfig) -> Self {
        Self {
            root: config.root_dir(),
            isolate_env: config.isolate_env,
            env: config.env.clone(),
        }
    }
}

#[async_trait]
impl ContainerBooter for PtyBooter {
    async fn boot(&self) -> Result<Arc<dyn Container>, SandboxError> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            SandboxError::Boot(format!(
                "cannot create sandbox root {}: {e}",
                self.root.display()
            ))
        })?;

        // Opening a throwaway pair proves the host can allocate PTYs.
        native_pty_system()
            .openpty(pty_size(TermSize::default()))
            .map_err(|e| SandboxError::Boot(format!("no PTY available: {e}")))?;

        tracing::info!(
            root = %self.root.display(),
            isolate_env = self.isolate_env,
            "sandbox container booted"
        );

        Ok(Arc::new(PtyContainer::new(
            self.root.clone(),
            self.isolate_env,
            self.env.clone(),
        )))
    }
}

// =============================================================================
// CONTAINER
// =============================================================================

pub struct PtyContainer {
    root: PathBuf,
    isolate_env: bool,
    env: HashMap<String, String>,
    killers: Killers,
    next_seq: AtomicU64,
    torn_down: AtomicBool,
}

impl PtyContainer {
    pub fn new(root: PathBuf, isolate_env: bool, env: HashMap<String, String>) -> Self {
        Self {
            root,
            isolate_env,
            env,
            killers: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(0),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Shells spawned here that have not been reaped yet.
    pub fn live_shells(&self) -> usize {
        lock_killers(&self.killers).len()
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    fn build_command(&self, request: &SpawnRequest) -> CommandBuilder {
        let mut cmd = CommandBuilder::new(&request.program);
        cmd.args(&request.args);
        cmd.cwd(&self.root);

        if self.isolate_env {
            cmd.env_clear();
            for key in ALLOWED_ENV_VARS {
                if let Ok(val) = std::env::var(key) {
                    cmd.env(key, val);
                }
            }
        }
        for (key, val) in &self.env {
            cmd.env(key, val);
        }
        cmd.env("TERM", "xterm-256color");
        cmd
    }
}

#[async_trait]
impl Container for PtyContainer {
    fn name(&self) -> &str {
        "pty"
    }

    async fn spawn(&self, request: SpawnRequest) -> Result<Box<dyn ShellProcess>, SandboxError> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(SandboxError::Process("container has been torn down".into()));
        }

        let spawn_err = |reason: String| SandboxError::Spawn {
            program: request.program.clone(),
            reason,
        };

        let pair = native_pty_system()
            .openpty(pty_size(request.size))
            .map_err(|e| spawn_err(format!("failed to open PTY: {e}")))?;

        let mut child = pair
            .slave
            .spawn_command(self.build_command(&request))
            .map_err(|e| spawn_err(e.to_string()))?;

        // Only the master side is needed from here on.
        drop(pair.slave);

        let pid = child.process_id();
        let killer = child.clone_killer();
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        lock_killers(&self.killers).insert(seq, child.clone_killer());

        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| spawn_err(format!("failed to take PTY writer: {e}")))?;
        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_err(format!("failed to clone PTY reader: {e}")))?;

        let exited = Arc::new(AtomicBool::new(false));

        // Waiter: reaps the child, drops its kill handle, and reports the
        // exit code.
        let (exit_tx, exit_rx) = std_mpsc::channel::<Option<u32>>();
        {
            let exited = Arc::clone(&exited);
            let killers = Arc::clone(&self.killers);
            thread::Builder::new()
                .name("sandbox-pty-wait".to_string())
                .spawn(move || {
                    let code = match child.wait() {
                        Ok(status) => Some(status.exit_code()),
                        Err(e) => {
                            tracing::debug!("PTY wait error: {e}");
                            None
                        }
                    };
                    lock_killers(&killers).remove(&seq);
                    exited.store(true, Ordering::SeqCst);
                    let _ = exit_tx.send(code);
                })?;
        }

        // Reader: forwards output, then the exit code once the PTY hits EOF.
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        thread::Builder::new()
            .name("sandbox-pty-reader".to_string())
            .spawn(move || {
                let mut buf = [0u8; PTY_READ_CHUNK];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(n) => {
                            if output_tx.send(ProcessOutput::Data(buf[..n].to_vec())).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::debug!("PTY reader error: {e}");
                            break;
                        }
                    }
                }
                let code = exit_rx.recv().ok().flatten();
                let _ = output_tx.send(ProcessOutput::Exited(code));
            })?;

        // Writer: keeps `write` non-blocking while preserving order.
        let (input_tx, input_rx) = std_mpsc::channel::<Vec<u8>>();
        thread::Builder::new()
            .name("sandbox-pty-writer".to_string())
            .spawn(move || {
                for chunk in input_rx {
                    if let Err(e) = writer.write_all(&chunk).and_then(|_| writer.flush()) {
                        tracing::debug!("PTY write failed: {e}");
                        break;
                    }
                }
            })?;

        tracing::info!(
            program = %request.program,
            pid = ?pid,
            size = %request.size,
            "sandbox shell spawned"
        );

        Ok(Box::new(PtyProcess {
            pid,
            input: Some(input_tx),
            output: Some(output_rx),
            master: pair.master,
            killer,
            exited,
        }))
    }

    async fn teardown(&self) {
        self.torn_down.store(true, Ordering::SeqCst);
        let mut killers = lock_killers(&self.killers);
        let count = killers.len();
        for killer in killers.values_mut() {
            if let Err(e) = killer.kill() {
                tracing::debug!("PTY kill error (may already be dead): {e}");
            }
        }
        drop(killers);
        tracing::info!(count, "sandbox container torn down");
    }
}

// =============================================================================
// PROCESS
// =============================================================================

pub struct PtyProcess {
    pid: Option<u32>,
    input: Option<std_mpsc::Sender<Vec<u8>>>,
    output: Option<mpsc::UnboundedReceiver<ProcessOutput>>,
    master: Box<dyn MasterPty + Send>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    exited: Arc<AtomicBool>,
}

impl ShellProcess for PtyProcess {
    fn pid(&self) -> Option<u32> {
        self.pid
    }

    fn take_output(&mut self) -> Option<mpsc::UnboundedReceiver<ProcessOutput>> {
        self.output.take()
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SandboxError> {
        let input = self
            .input
            .as_ref()
            .ok_or_else(|| SandboxError::Process("shell input is closed".into()))?;
        input
            .send(data.to_vec())
            .map_err(|_| SandboxError::Process("shell input is closed".into()))
    }

    fn resize(&mut self, size: TermSize) -> Result<(), SandboxError> {
        self.master
            .resize(pty_size(size))
            .map_err(|e| SandboxError::Process(format!("PTY resize failed: {e}")))
    }

    fn kill(&mut self) -> Result<(), SandboxError> {
        self.input = None;
        if self.exited.load(Ordering::SeqCst) {
            return Ok(());
        }
        self.killer.kill()?;
        Ok(())
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            tracing::debug!("PTY kill error (may already be dead): {e}");
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
