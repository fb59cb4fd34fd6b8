use std::sync::Arc;

use termbridge_common::SandboxError;

use super::container::{Container, ContainerBooter};
use crate::single_flight::{InitError, SharedService};

/// Application-scoped owner of the one sandbox container.
///
/// Created once by the application and handed to every sandbox backend.
/// The container is booted on first use; views share it and never tear it
/// down. Only [`shutdown`](Self::shutdown) releases it.
pub struct SandboxService {
    shared: Arc<SharedService<Arc<dyn Container>>>,
    booter: Arc<dyn ContainerBooter>,
}

impl SandboxService {
    pub fn new(booter: Arc<dyn ContainerBooter>) -> Arc<Self> {
        Arc::new(Self {
            shared: SharedService::new("sandbox"),
            booter,
        })
    }

    /// The shared container, booting it if nobody has yet.
    pub async fn container(&self) -> Result<Arc<dyn Container>, SandboxError> {
        let booter = Arc::clone(&self.booter);
        self.shared
            .get_or_init(move || async move {
                booter.boot().await.map_err(|e| match e {
                    SandboxError::Boot(reason) => reason,
                    other => other.to_string(),
                })
            })
            .await
            .map_err(|e| match e {
                InitError::Failed { reason, .. } => SandboxError::Boot(reason),
                aborted @ InitError::Aborted { .. } => SandboxError::Boot(aborted.to_string()),
            })
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_ready()
    }

    /// Number of boots started, for diagnostics.
    pub fn boot_count(&self) -> usize {
        self.shared.boot_count()
    }

    /// App-level teardown. Also clears a cached boot failure, so the next
    /// request boots again.
    pub async fn shutdown(&self) {
        if let Some(container) = self.shared.reset() {
            tracing::info!(container = container.name(), "tearing down sandbox");
            container.teardown().await;
        }
    }
}
