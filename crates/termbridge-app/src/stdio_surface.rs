//! The host terminal as a [`TerminalSurface`].
//!
//! Output goes straight to stdout. A reader thread turns stdin into input
//! events and watches for the detach key; on Unix a SIGWINCH listener turns
//! window changes into resize events. Raw mode is the caller's job (see
//! [`crate::guard::RawModeGuard`]).

use std::io::{self, Read, Write};
use std::sync::Arc;
use std::thread;

use termbridge_bridge::{SurfaceEvent, TerminalSurface};
use termbridge_common::{SurfaceError, TermSize};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;

const STDIN_CHUNK: usize = 1024;

pub struct StdioSurface {
    out: io::Stdout,
    fallback: TermSize,
    events_rx: Option<mpsc::UnboundedReceiver<SurfaceEvent>>,
    resize_task: Option<JoinHandle<()>>,
    disposed: bool,
}

/// Fires once when the user presses the detach key.
#[derive(Clone)]
pub struct Detach(Arc<Notify>);

impl Detach {
    pub async fn wait(&self) {
        self.0.notified().await;
    }
}

/// Split a stdin chunk at the detach byte. Returns the bytes to forward and
/// whether the detach key was seen.
pub fn split_detach(chunk: &[u8], detach: Option<u8>) -> (&[u8], bool) {
    match detach.and_then(|d| chunk.iter().position(|&b| b == d)) {
        Some(pos) => (&chunk[..pos], true),
        None => (chunk, false),
    }
}

fn host_size() -> Option<TermSize> {
    crossterm::terminal::size()
        .ok()
        .map(|(cols, rows)| TermSize::new(cols, rows))
        .filter(TermSize::is_valid)
}

impl StdioSurface {
    /// Must be called inside a tokio runtime.
    pub fn new(fallback: TermSize, detach_byte: Option<u8>) -> io::Result<(Self, Detach)> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let detach = Detach(Arc::new(Notify::new()));

        {
            let events_tx = events_tx.clone();
            let detach = Arc::clone(&detach.0);
            thread::Builder::new()
                .name("termbridge-stdin".to_string())
                .spawn(move || read_stdin(events_tx, detach, detach_byte))?;
        }

        let resize_task = spawn_resize_listener(events_tx, fallback);

        Ok((
            Self {
                out: io::stdout(),
                fallback,
                events_rx: Some(events_rx),
                resize_task,
                disposed: false,
            },
            detach,
        ))
    }
}

fn read_stdin(
    events_tx: mpsc::UnboundedSender<SurfaceEvent>,
    detach: Arc<Notify>,
    detach_byte: Option<u8>,
) {
    let mut stdin = io::stdin().lock();
    let mut buf = [0u8; STDIN_CHUNK];
    loop {
        let n = match stdin.read(&mut buf) {
            Ok(0) => {
                tracing::debug!("stdin closed");
                break;
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                tracing::warn!(error = %e, "stdin read failed");
                break;
            }
        };

        let (forward, detached) = split_detach(&buf[..n], detach_byte);
        if !forward.is_empty() && events_tx.send(SurfaceEvent::Input(forward.to_vec())).is_err() {
            break;
        }
        if detached {
            tracing::info!("detach key pressed");
            detach.notify_one();
            break;
        }
    }
}

#[cfg(unix)]
fn spawn_resize_listener(
    events_tx: mpsc::UnboundedSender<SurfaceEvent>,
    fallback: TermSize,
) -> Option<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut winch = match signal(SignalKind::window_change()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for window changes");
            return None;
        }
    };
    Some(tokio::spawn(async move {
        while winch.recv().await.is_some() {
            let size = host_size().unwrap_or(fallback);
            tracing::debug!(%size, "host terminal resized");
            if events_tx.send(SurfaceEvent::Resize(size)).is_err() {
                break;
            }
        }
    }))
}

#[cfg(not(unix))]
fn spawn_resize_listener(
    _events_tx: mpsc::UnboundedSender<SurfaceEvent>,
    _fallback: TermSize,
) -> Option<JoinHandle<()>> {
    None
}

impl TerminalSurface for StdioSurface {
    fn size(&self) -> TermSize {
        host_size().unwrap_or(self.fallback)
    }

    fn write(&mut self, data: &str) -> Result<(), SurfaceError> {
        if self.disposed {
            return Err(SurfaceError::Disposed);
        }
        self.out.write_all(data.as_bytes())?;
        self.out.flush()?;
        Ok(())
    }

    fn subscribe(&mut self) -> Option<mpsc::UnboundedReceiver<SurfaceEvent>> {
        self.events_rx.take()
    }

    fn dispose(&mut self) -> Result<(), SurfaceError> {
        self.disposed = true;
        if let Some(task) = self.resize_task.take() {
            task.abort();
        }
        self.out.write_all(b"\r\n")?;
        self.out.flush()?;
        Ok(())
    }
}
