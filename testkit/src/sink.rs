//! # Recording Event Sink
//!
//! An [`EventSink`] that keeps every event in emission order so tests can
//! assert on the exact audit trail an operation produced.

use parking_lot::Mutex;

use basin_core::events::{EventSink, VaultEvent};

/// Appends every emitted event to a vector.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<VaultEvent>>,
}

impl RecordingSink {
    /// An empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything recorded so far, in emission order.
    pub fn events(&self) -> Vec<VaultEvent> {
        self.events.lock().clone()
    }

    /// Drains the recording, leaving it empty for the next phase of a
    /// test.
    pub fn take(&self) -> Vec<VaultEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Number of recorded events matching `predicate`.
    pub fn count_matching(&self, predicate: impl Fn(&VaultEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// The most recent event, if any.
    pub fn last(&self) -> Option<VaultEvent> {
        self.events.lock().last().cloned()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: VaultEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_in_order() {
        let sink = RecordingSink::new();
        sink.emit(VaultEvent::Paused);
        sink.emit(VaultEvent::Unpaused);
        assert_eq!(sink.events(), vec![VaultEvent::Paused, VaultEvent::Unpaused]);
        assert_eq!(sink.last(), Some(VaultEvent::Unpaused));
    }

    #[test]
    fn take_drains() {
        let sink = RecordingSink::new();
        sink.emit(VaultEvent::Paused);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn count_matching_filters() {
        let sink = RecordingSink::new();
        sink.emit(VaultEvent::Paused);
        sink.emit(VaultEvent::Unpaused);
        sink.emit(VaultEvent::Paused);
        assert_eq!(
            sink.count_matching(|e| matches!(e, VaultEvent::Paused)),
            2
        );
    }
}
