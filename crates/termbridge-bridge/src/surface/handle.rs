//! Shared, dispose-once wrapper around a boxed surface.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use termbridge_common::TermSize;
use tokio::sync::mpsc;

use super::{SurfaceEvent, TerminalSurface};

struct Slot {
    surface: Option<Box<dyn TerminalSurface>>,
    last_size: TermSize,
}

/// Cloneable handle shared by a view and its bridge task.
///
/// Once [`dispose`](Self::dispose) has run, writes are silently dropped and
/// `size()` reports the last size seen.
#[derive(Clone)]
pub struct SurfaceHandle {
    slot: Arc<Mutex<Slot>>,
}

impl SurfaceHandle {
    pub fn new(surface: Box<dyn TerminalSurface>) -> Self {
        let last_size = surface.size();
        Self {
            slot: Arc::new(Mutex::new(Slot {
                surface: Some(surface),
                last_size,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current surface size.
    pub fn size(&self) -> TermSize {
        let mut slot = self.lock();
        if let Some(size) = slot.surface.as_ref().map(|s| s.size()) {
            slot.last_size = size;
        }
        slot.last_size
    }

    /// Write output to the surface. Returns `false` if the surface is gone.
    pub fn write(&self, data: &str) -> bool {
        let mut slot = self.lock();
        let Some(surface) = slot.surface.as_mut() else {
            tracing::trace!(bytes = data.len(), "write after dispose dropped");
            return false;
        };
        if let Err(e) = surface.write(data) {
            tracing::debug!(error = %e, "surface write failed");
        }
        true
    }

    /// Take the surface's event stream.
    pub fn subscribe(&self) -> Option<mpsc::UnboundedReceiver<SurfaceEvent>> {
        self.lock().surface.as_mut().and_then(|s| s.subscribe())
    }

    pub fn is_disposed(&self) -> bool {
        self.lock().surface.is_none()
    }

    /// Dispose the surface exactly once.
    ///
    /// Errors and panics raised by the surface are logged, never propagated.
    /// Returns `true` if this call performed the disposal.
    pub fn dispose(&self) -> bool {
        let Some(mut surface) = self.lock().surface.take() else {
            return false;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(move || {
            let result = surface.dispose();
            drop(surface);
            result
        }));

        match outcome {
            Ok(Ok(())) => tracing::debug!("surface disposed"),
            Ok(Err(e)) => tracing::error!(error = %e, "error disposing surface"),
            Err(_) => tracing::error!("surface panicked during dispose"),
        }
        true
    }
}

// =============================================================================
// TESTS
// =============================================================================
