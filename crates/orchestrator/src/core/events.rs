//! Ordered event emitter with sequence guarantees.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use events::{Event, EventBus, EventEnvelope, EventSender};
use tracing::debug;

/// Sole producer of one session's events.
///
/// Sequence numbers start at 0 and are assigned at emission, so they stay
/// gapless even after the consumer detaches and envelopes stop being delivered.
pub struct OrderedEventEmitter {
    session_id: String,
    sender: EventSender,
    bus: Option<EventBus>,
    sequence: AtomicU64,
    detached: AtomicBool,
}

impl OrderedEventEmitter {
    pub fn new(session_id: impl Into<String>, sender: EventSender) -> Self {
        Self {
            session_id: session_id.into(),
            sender,
            bus: None,
            sequence: AtomicU64::new(0),
            detached: AtomicBool::new(false),
        }
    }

    /// Mirror every envelope onto a process-wide bus
    pub fn with_bus(mut self, bus: Option<EventBus>) -> Self {
        self.bus = bus;
        self
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    fn next_envelope(&self, event: Event) -> EventEnvelope {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let envelope = EventEnvelope::new(self.session_id.clone(), sequence, event);
        if let Some(bus) = &self.bus {
            bus.publish(envelope.clone());
        }
        envelope
    }

    /// Emit with the next sequence number, waiting for channel space.
    /// Returns the assigned sequence number.
    pub async fn emit(&self, event: Event) -> u64 {
        let envelope = self.next_envelope(event);
        let sequence = envelope.sequence;
        if !self.is_detached() && !self.sender.send(envelope).await {
            self.mark_detached();
        }
        sequence
    }

    /// Non-blocking emit for use from `Drop`
    pub fn try_emit(&self, event: Event) -> bool {
        let envelope = self.next_envelope(event);
        !self.is_detached() && self.sender.try_send(envelope)
    }

    fn mark_detached(&self) {
        if !self.detached.swap(true, Ordering::SeqCst) {
            debug!(
                session_id = %self.session_id,
                "Event consumer detached, session continues without streaming"
            );
        }
    }

    pub fn is_detached(&self) -> bool {
        self.detached.load(Ordering::SeqCst)
    }

    /// Next sequence number to be assigned (equals the count emitted so far)
    pub fn current_sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk() -> Event {
        Event::AnswerChunk {
            content: "x".to_string(),
        }
    }

    #[tokio::test]
    async fn test_sequence_increments() {
        let (tx, stream) = events::channel(8);
        let emitter = OrderedEventEmitter::new("s-1", tx);

        assert_eq!(emitter.emit(chunk()).await, 0);
        assert_eq!(emitter.emit(chunk()).await, 1);
        assert_eq!(emitter.current_sequence(), 2);
        drop(emitter);

        let received = stream.collect_all().await;
        assert_eq!(received.len(), 2);
        assert!(received.iter().all(|e| e.session_id == "s-1"));
    }

    #[tokio::test]
    async fn test_detach_keeps_numbering() {
        let (tx, stream) = events::channel(8);
        let emitter = OrderedEventEmitter::new("s-1", tx);
        drop(stream);

        emitter.emit(chunk()).await;
        assert!(emitter.is_detached());
        assert_eq!(emitter.emit(chunk()).await, 1);
    }

    #[tokio::test]
    async fn test_bus_mirrors_envelopes() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let (tx, _stream) = events::channel(8);
        let emitter = OrderedEventEmitter::new("s-1", tx).with_bus(Some(bus));

        emitter.emit(chunk()).await;
        assert_eq!(rx.recv().await.unwrap().sequence, 0);
    }
}
