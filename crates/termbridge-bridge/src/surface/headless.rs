//! In-memory surface for embedding and tests.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use termbridge_common::{SurfaceError, TermSize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use super::{SurfaceEvent, TerminalSurface};

#[derive(Default)]
struct Record {
    size: TermSize,
    writes: Vec<String>,
    dispose_count: usize,
}

/// A surface with no display. Output is recorded; input and resizes are
/// injected through the paired [`HeadlessProbe`].
pub struct HeadlessSurface {
    record: Arc<Mutex<Record>>,
    events_rx: Option<mpsc::UnboundedReceiver<SurfaceEvent>>,
}

/// Controller and inspector for a [`HeadlessSurface`].
#[derive(Clone)]
pub struct HeadlessProbe {
    record: Arc<Mutex<Record>>,
    events_tx: mpsc::UnboundedSender<SurfaceEvent>,
}

fn lock(record: &Mutex<Record>) -> MutexGuard<'_, Record> {
    record.lock().unwrap_or_else(PoisonError::into_inner)
}

impl HeadlessSurface {
    pub fn new(size: TermSize) -> (Self, HeadlessProbe) {
        let record = Arc::new(Mutex::new(Record {
            size,
            ..Record::default()
        }));
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let surface = Self {
            record: Arc::clone(&record),
            events_rx: Some(events_rx),
        };
        (surface, HeadlessProbe { record, events_tx })
    }
}

impl TerminalSurface for HeadlessSurface {
    fn size(&self) -> TermSize {
        lock(&self.record).size
    }

    fn write(&mut self, data: &str) -> Result<(), SurfaceError> {
        let mut record = lock(&self.record);
        if record.dispose_count > 0 {
            return Err(SurfaceError::Disposed);
        }
        record.writes.push(data.to_string());
        Ok(())
    }

    fn subscribe(&mut self) -> Option<mpsc::UnboundedReceiver<SurfaceEvent>> {
        self.events_rx.take()
    }

    fn dispose(&mut self) -> Result<(), SurfaceError> {
        lock(&self.record).dispose_count += 1;
        Ok(())
    }
}

impl HeadlessProbe {
    /// Simulate the user typing `data`.
    pub fn type_input(&self, data: impl Into<Vec<u8>>) {
        let _ = self.events_tx.send(SurfaceEvent::Input(data.into()));
    }

    /// Change the surface size and emit a resize event.
    pub fn resize(&self, size: TermSize) {
        self.set_size(size);
        let _ = self.events_tx.send(SurfaceEvent::Resize(size));
    }

    /// Change the reported size without emitting an event.
    pub fn set_size(&self, size: TermSize) {
        lock(&self.record).size = size;
    }

    /// Every write, in order.
    pub fn writes(&self) -> Vec<String> {
        lock(&self.record).writes.clone()
    }

    /// All writes concatenated.
    pub fn output(&self) -> String {
        lock(&self.record).writes.concat()
    }

    pub fn dispose_count(&self) -> usize {
        lock(&self.record).dispose_count
    }

    /// Poll until the accumulated output contains `needle`.
    pub async fn wait_for_output(&self, needle: &str, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.output().contains(needle) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_events_arrive_in_order() {
        let (mut surface, probe) = HeadlessSurface::new(TermSize::default());
        let mut rx = surface.subscribe().unwrap();

        probe.type_input("l");
        probe.type_input("s");
        probe.resize(TermSize::new(100, 50));

        assert_eq!(rx.recv().await, Some(SurfaceEvent::Input(b"l".to_vec())));
        assert_eq!(rx.recv().await, Some(SurfaceEvent::Input(b"s".to_vec())));
        assert_eq!(
            rx.recv().await,
            Some(SurfaceEvent::Resize(TermSize::new(100, 50)))
        );
        assert_eq!(surface.size(), TermSize::new(100, 50));
    }

    #[test]
    fn writes_are_recorded() {
        let (mut surface, probe) = HeadlessSurface::new(TermSize::default());
        surface.write("a").unwrap();
        surface.write("b\r\n").unwrap();
        assert_eq!(probe.writes(), vec!["a", "b\r\n"]);
        assert_eq!(probe.output(), "ab\r\n");
    }

    #[test]
    fn write_after_dispose_fails() {
        let (mut surface, probe) = HeadlessSurface::new(TermSize::default());
        surface.dispose().unwrap();
        assert!(matches!(surface.write("x"), Err(SurfaceError::Disposed)));
        assert_eq!(probe.dispose_count(), 1);
    }

    #[tokio::test]
    async fn wait_for_output_times_out() {
        let (_surface, probe) = HeadlessSurface::new(TermSize::default());
        assert!(
            !probe
                .wait_for_output("never", Duration::from_millis(20))
                .await
        );
    }
}
