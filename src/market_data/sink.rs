// Where normalized events leave the core
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::error;

use crate::engine::types::DataEvent;

pub trait EventSink: Send + Sync {
    fn publish(&self, event: DataEvent);
}

impl EventSink for mpsc::UnboundedSender<DataEvent> {
    fn publish(&self, event: DataEvent) {
        if let Err(e) = self.send(event) {
            error!(event = ?e.0, "Event receiver dropped, discarding event");
        }
    }
}

/// Keeps every published event in memory; handy for tests and replay tools.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DataEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<DataEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for RecordingSink {
    fn publish(&self, event: DataEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Instrument;

    #[tokio::test]
    async fn test_channel_sink_forwards() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let event = DataEvent::Instrument(Instrument::new("m", "a", None));
        tx.publish(event.clone());
        assert_eq!(rx.recv().await, Some(event));
    }

    #[test]
    fn test_closed_channel_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        tx.publish(DataEvent::Instrument(Instrument::new("m", "a", None)));
    }

    #[test]
    fn test_recording_sink_take() {
        let sink = RecordingSink::new();
        sink.publish(DataEvent::Instrument(Instrument::new("m", "a", None)));
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.take().len(), 1);
        assert!(sink.is_empty());
    }
}
