//! One active terminal connection and its state machine.
//!
//! The session carries the idempotency flag for setup (`begin`) instead of
//! a free-standing "already initializing" boolean, and publishes its
//! connection state and lifecycle phase through `watch` channels.

use std::sync::{Mutex, MutexGuard, PoisonError};

use termbridge_common::{BackendKind, BridgePhase, ConnectionState, SessionId, TermSize};
use tokio::sync::watch;

/// Why a session stopped doing useful work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The remote side closed the connection.
    Disconnected,
    /// Initialization failed.
    Failed,
    /// The sandbox shell exited.
    Exited(Option<u32>),
}

#[derive(Default)]
struct History {
    connection: Vec<ConnectionState>,
    phase: Vec<BridgePhase>,
}

pub struct Session {
    id: SessionId,
    kind: BackendKind,
    size: Mutex<TermSize>,
    connection: watch::Sender<ConnectionState>,
    phase: watch::Sender<BridgePhase>,
    end: watch::Sender<Option<SessionEnd>>,
    history: Mutex<History>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Session {
    pub fn new(kind: BackendKind, size: TermSize) -> Self {
        Self {
            id: SessionId::new(),
            kind,
            size: Mutex::new(size),
            connection: watch::channel(ConnectionState::Disconnected).0,
            phase: watch::channel(BridgePhase::Idle).0,
            end: watch::channel(None).0,
            history: Mutex::new(History::default()),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn size(&self) -> TermSize {
        *lock(&self.size)
    }

    pub fn set_size(&self, size: TermSize) {
        *lock(&self.size) = size;
    }

    pub fn connection(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn phase(&self) -> BridgePhase {
        *self.phase.borrow()
    }

    pub fn end(&self) -> Option<SessionEnd> {
        *self.end.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.subscribe()
    }

    pub fn watch_phase(&self) -> watch::Receiver<BridgePhase> {
        self.phase.subscribe()
    }

    /// `Idle -> Initializing`. Returns `false` if setup already started.
    pub fn begin(&self) -> bool {
        let started = self.phase.send_if_modified(|phase| {
            if *phase == BridgePhase::Idle {
                *phase = BridgePhase::Initializing;
                true
            } else {
                false
            }
        });
        if started {
            lock(&self.history).phase.push(BridgePhase::Initializing);
            tracing::debug!(session = self.id.short(), kind = %self.kind, "initializing");
        }
        started
    }

    pub fn set_phase(&self, phase: BridgePhase) {
        if self.phase.send_replace(phase) != phase {
            lock(&self.history).phase.push(phase);
            tracing::debug!(session = self.id.short(), ?phase, "phase changed");
        }
    }

    pub fn set_connection(&self, state: ConnectionState) {
        if self.connection.send_replace(state) != state {
            lock(&self.history).connection.push(state);
            tracing::info!(session = self.id.short(), %state, "connection state changed");
        }
    }

    /// Record the first terminal condition. Later calls are ignored.
    pub fn settle(&self, end: SessionEnd) {
        self.end.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(end);
                true
            } else {
                false
            }
        });
    }

    /// Mark initialization as failed and settle the session.
    pub fn fail(&self) {
        self.set_phase(BridgePhase::Failed);
        self.settle(SessionEnd::Failed);
    }

    /// Every connection state entered, in order. The initial
    /// `Disconnected` is not included.
    pub fn connection_history(&self) -> Vec<ConnectionState> {
        lock(&self.history).connection.clone()
    }

    pub fn phase_history(&self) -> Vec<BridgePhase> {
        lock(&self.history).phase.clone()
    }

    /// Wait until the session reaches a terminal condition.
    pub async fn wait_until_settled(&self) -> SessionEnd {
        let mut rx = self.end.subscribe();
        let result = rx.wait_for(|end| end.is_some()).await;
        match result {
            Ok(end) => end.unwrap_or(SessionEnd::Failed),
            // The sender lives in `self`, so this cannot close while borrowed.
            Err(_) => SessionEnd::Failed,
        }
    }

    /// Back to `Idle` after unmount, so a fresh mount can initialize again.
    pub fn reset(&self) {
        self.set_connection(ConnectionState::Disconnected);
        self.set_phase(BridgePhase::Idle);
        self.end.send_replace(None);
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn session() -> Session {
        Session::new(BackendKind::Remote, TermSize::default())
    }

    #[test]
    fn starts_idle_and_disconnected() {
        let s = session();
        assert_eq!(s.phase(), BridgePhase::Idle);
        assert_eq!(s.connection(), ConnectionState::Disconnected);
        assert!(s.connection_history().is_empty());
        assert_eq!(s.end(), None);
    }

    #[test]
    fn begin_is_idempotent_until_reset() {
        let s = session();
        assert!(s.begin());
        assert!(!s.begin());
        s.set_phase(BridgePhase::Ready);
        assert!(!s.begin());

        s.reset();
        assert_eq!(s.phase(), BridgePhase::Idle);
        assert!(s.begin());
    }

    #[test]
    fn history_records_changes_only() {
        let s = session();
        s.set_connection(ConnectionState::Connecting);
        s.set_connection(ConnectionState::Connected);
        s.set_connection(ConnectionState::Connected);
        s.set_connection(ConnectionState::Disconnected);
        assert_eq!(
            s.connection_history(),
            vec![
                ConnectionState::Connecting,
                ConnectionState::Connected,
                ConnectionState::Disconnected
            ]
        );
    }

    #[test]
    fn phase_history_tracks_lifecycle() {
        let s = session();
        s.begin();
        s.fail();
        s.reset();
        assert_eq!(
            s.phase_history(),
            vec![
                BridgePhase::Initializing,
                BridgePhase::Failed,
                BridgePhase::Idle
            ]
        );
    }

    #[test]
    fn first_settle_wins() {
        let s = session();
        s.settle(SessionEnd::Exited(Some(0)));
        s.settle(SessionEnd::Disconnected);
        assert_eq!(s.end(), Some(SessionEnd::Exited(Some(0))));

        s.reset();
        assert_eq!(s.end(), None);
    }

    #[tokio::test]
    async fn wait_until_settled_wakes_on_settle() {
        let s = Arc::new(session());
        let waiter = {
            let s = Arc::clone(&s);
            tokio::spawn(async move { s.wait_until_settled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        s.settle(SessionEnd::Disconnected);

        let end = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(end, SessionEnd::Disconnected);
    }

    #[test]
    fn watchers_see_latest_state() {
        let s = session();
        let rx = s.watch_connection();
        s.set_connection(ConnectionState::Connecting);
        assert_eq!(*rx.borrow(), ConnectionState::Connecting);
    }
}
