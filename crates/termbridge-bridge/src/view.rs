//! Terminal view: binds one surface to one backend for a mount/unmount cycle.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use termbridge_common::{BackendKind, BridgeError, SurfaceError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::isolation::{Isolation, IsolationCheck};
use crate::notices;
use crate::session::{Session, SessionEnd};
use crate::surface::{SurfaceEvent, SurfaceHandle, TerminalSurface};

/// How long `unmount` waits for the bridge task to release its resource
/// before aborting it.
const UNMOUNT_GRACE: Duration = Duration::from_secs(2);

/// Everything a backend needs to drive one session.
pub struct BridgeLink {
    pub session: Arc<Session>,
    pub surface: SurfaceHandle,
    pub events: mpsc::UnboundedReceiver<SurfaceEvent>,
    /// Fires on unmount. Backends stop waiting on boot, release the
    /// resource they own and return.
    pub cancel: CancellationToken,
}

impl BridgeLink {
    /// Evaluate an isolation check. An unsatisfied result is shown and
    /// logged, then the caller proceeds anyway.
    pub fn report_isolation(&self, check: &IsolationCheck) {
        if let Isolation::Unsatisfied(reason) = check() {
            tracing::warn!(
                session = self.session.id().short(),
                kind = %self.session.kind(),
                %reason,
                "isolation precondition not met, continuing"
            );
            self.surface.write(&notices::isolation_warning(&reason));
        }
    }
}

/// A backend a surface can be bridged to.
#[async_trait]
pub trait Backend: Send + Sync {
    fn kind(&self) -> BackendKind;

    /// Initialize, wire the streams, and pump until the session ends or
    /// `link.cancel` fires.
    ///
    /// Returning `Err` during initialization moves the session to
    /// `Failed` and writes the error into the surface.
    async fn run(&self, link: BridgeLink) -> Result<(), BridgeError>;
}

pub struct TerminalView {
    backend: Arc<dyn Backend>,
    surface: SurfaceHandle,
    session: Arc<Session>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl TerminalView {
    pub fn new(backend: Arc<dyn Backend>, surface: Box<dyn TerminalSurface>) -> Self {
        let surface = SurfaceHandle::new(surface);
        let session = Arc::new(Session::new(backend.kind(), surface.size()));
        Self {
            backend,
            surface,
            session,
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn surface(&self) -> &SurfaceHandle {
        &self.surface
    }

    pub fn is_mounted(&self) -> bool {
        self.task.is_some()
    }

    /// Start the bridge. Must be called inside a tokio runtime.
    ///
    /// Returns `Ok(false)` without doing anything if this view is already
    /// mounted.
    pub fn mount(&mut self) -> Result<bool, BridgeError> {
        if self.surface.is_disposed() {
            return Err(SurfaceError::Disposed.into());
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| BridgeError::Other(format!("mount outside a tokio runtime: {e}")))?;

        if !self.session.begin() {
            tracing::debug!(session = self.session.id().short(), "mount ignored, already mounted");
            return Ok(false);
        }

        let Some(events) = self.surface.subscribe() else {
            self.session.reset();
            return Err(BridgeError::Other(
                "surface event stream is already taken".into(),
            ));
        };

        self.session.set_size(self.surface.size());
        let link = BridgeLink {
            session: Arc::clone(&self.session),
            surface: self.surface.clone(),
            events,
            cancel: self.cancel.clone(),
        };

        tracing::info!(
            session = self.session.id().short(),
            kind = %self.backend.kind(),
            size = %self.session.size(),
            "mounting terminal view"
        );

        let backend = Arc::clone(&self.backend);
        self.task = Some(runtime.spawn(drive(backend, link)));
        Ok(true)
    }

    /// Tear the view down: cancel the bridge, wait for it to release its
    /// resource, then dispose the surface. Never fails.
    pub async fn unmount(&mut self) {
        self.cancel.cancel();

        if let Some(mut task) = self.task.take() {
            match tokio::time::timeout(UNMOUNT_GRACE, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_panic() => {
                    tracing::error!(session = self.session.id().short(), "bridge task panicked");
                }
                Ok(Err(_)) => {}
                Err(_) => {
                    tracing::warn!(
                        session = self.session.id().short(),
                        "bridge task ignored cancellation, aborting"
                    );
                    task.abort();
                }
            }
        }

        self.surface.dispose();
        self.session.reset();
        self.cancel = CancellationToken::new();
        tracing::info!(session = self.session.id().short(), "terminal view unmounted");
    }

    /// Resolves when the session ends on its own.
    pub async fn wait_until_settled(&self) -> SessionEnd {
        self.session.wait_until_settled().await
    }
}

impl Drop for TerminalView {
    fn drop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.surface.dispose();
    }
}

async fn drive(backend: Arc<dyn Backend>, link: BridgeLink) {
    let session = Arc::clone(&link.session);
    let surface = link.surface.clone();
    let cancel = link.cancel.clone();

    match backend.run(link).await {
        Ok(()) => {
            tracing::debug!(session = session.id().short(), "bridge finished");
        }
        Err(BridgeError::Cancelled) => {
            tracing::debug!(session = session.id().short(), "bridge cancelled during setup");
        }
        Err(e) => {
            tracing::error!(session = session.id().short(), error = %e, "bridge failed");
            if !cancel.is_cancelled() {
                surface.write(&notices::error(&e.to_string()));
            }
            session.fail();
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
