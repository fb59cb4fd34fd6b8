//! Application-scoped service with single-flight lazy initialization.
//!
//! Replaces a module-level singleton: the service is created once by the
//! application and passed explicitly to whoever needs it. The first caller
//! of [`SharedService::get_or_init`] starts the boot; callers arriving while
//! it is in flight wait on the same boot; later callers get the cached value.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

type Outcome<T> = Option<Result<T, String>>;

enum InitState<T> {
    NotStarted,
    /// Boot in flight. Waiters subscribe to the receiver.
    InProgress {
        generation: u64,
        rx: watch::Receiver<Outcome<T>>,
    },
    Ready(T),
    /// A failed boot is cached until [`SharedService::reset`].
    Failed(String),
}

/// Why a caller did not get a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InitError {
    #[error("{name} initialization failed: {reason}")]
    Failed { name: &'static str, reason: String },

    /// The boot task ended without reporting (panicked or was reset).
    #[error("{name} initialization was aborted")]
    Aborted { name: &'static str },
}

struct Inner<T> {
    state: InitState<T>,
    generation: u64,
}

/// A lazily booted, shared value.
pub struct SharedService<T> {
    name: &'static str,
    inner: Mutex<Inner<T>>,
    boots: AtomicUsize,
}

impl<T> SharedService<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            inner: Mutex::new(Inner {
                state: InitState::NotStarted,
                generation: 0,
            }),
            boots: AtomicUsize::new(0),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Number of boot routines started so far.
    pub fn boot_count(&self) -> usize {
        self.boots.load(Ordering::SeqCst)
    }

    /// The cached value, if the boot has completed.
    pub fn get(&self) -> Option<T> {
        match &self.lock().state {
            InitState::Ready(value) => Some(value.clone()),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.lock().state, InitState::Ready(_))
    }

    pub fn is_booting(&self) -> bool {
        matches!(self.lock().state, InitState::InProgress { .. })
    }

    /// Return the shared value, booting it with `init` if nobody has yet.
    ///
    /// `init` is only called by the first requester. The boot runs on its
    /// own task, so dropping this future does not abort it for others.
    pub async fn get_or_init<F, Fut>(self: &Arc<Self>, init: F) -> Result<T, InitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, String>> + Send + 'static,
    {
        let (generation, mut rx) = {
            let mut inner = self.lock();
            let joined = match &inner.state {
                InitState::Ready(value) => return Ok(value.clone()),
                InitState::Failed(reason) => {
                    return Err(InitError::Failed {
                        name: self.name,
                        reason: reason.clone(),
                    })
                }
                InitState::InProgress { generation, rx } => Some((*generation, rx.clone())),
                InitState::NotStarted => None,
            };

            match joined {
                Some((generation, rx)) => {
                    tracing::debug!(service = self.name, generation, "joining in-flight boot");
                    (generation, rx)
                }
                None => {
                    inner.generation += 1;
                    let generation = inner.generation;
                    let (tx, rx) = watch::channel(None);
                    inner.state = InitState::InProgress {
                        generation,
                        rx: rx.clone(),
                    };
                    self.boots.fetch_add(1, Ordering::SeqCst);
                    tracing::info!(service = self.name, generation, "booting");

                    let boot = init();
                    let service = Arc::clone(self);
                    tokio::spawn(async move {
                        let outcome = boot.await;
                        service.complete(generation, outcome.clone());
                        let _ = tx.send(Some(outcome));
                    });
                    (generation, rx)
                }
            }
        };

        let outcome = match rx.wait_for(|outcome| outcome.is_some()).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(Ok(value)) => Ok(value),
            Some(Err(reason)) => Err(InitError::Failed {
                name: self.name,
                reason,
            }),
            None => {
                // The boot task is gone. Let the next caller start over,
                // unless a newer boot has already replaced it.
                let mut inner = self.lock();
                if matches!(
                    inner.state,
                    InitState::InProgress { generation: g, .. } if g == generation
                ) {
                    inner.state = InitState::NotStarted;
                }
                Err(InitError::Aborted { name: self.name })
            }
        }
    }

    fn complete(&self, generation: u64, outcome: Result<T, String>) {
        let mut inner = self.lock();
        let current = matches!(
            inner.state,
            InitState::InProgress { generation: g, .. } if g == generation
        );
        if !current {
            tracing::debug!(service = self.name, generation, "stale boot result discarded");
            return;
        }
        inner.state = match outcome {
            Ok(value) => {
                tracing::info!(service = self.name, "ready");
                InitState::Ready(value)
            }
            Err(reason) => {
                tracing::error!(service = self.name, error = %reason, "boot failed");
                InitState::Failed(reason)
            }
        };
    }

    /// Forget the cached value (or failure) and return it.
    ///
    /// A boot still in flight is orphaned: its waiters get its result, but
    /// the service no longer caches it.
    pub fn reset(&self) -> Option<T> {
        let mut inner = self.lock();
        let previous = std::mem::replace(&mut inner.state, InitState::NotStarted);
        match previous {
            InitState::Ready(value) => Some(value),
            _ => None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
