//! Process-wide broadcast tap over all session events

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::debug;

use crate::types::EventEnvelope;

const DEFAULT_CAPACITY: usize = 1024;

/// Mirrors every published envelope to all current subscribers.
///
/// Slow subscribers lag and lose envelopes; the per-session channel is the
/// delivery path with ordering guarantees, this is monitoring only.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    published: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            published: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns how many subscribers received the envelope (0 when none listen)
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.published.fetch_add(1, Ordering::Relaxed);
        self.sender.send(envelope).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Subscribe as a stream, optionally restricted to one session.
    ///
    /// A lagging subscriber skips the envelopes it missed (logged at debug
    /// level); the stream ends when the bus is dropped.
    pub fn subscribe_stream(
        &self,
        session_id: Option<String>,
    ) -> impl Stream<Item = EventEnvelope> + Send + 'static {
        BroadcastStream::new(self.sender.subscribe()).filter_map(move |item| {
            let keep = match item {
                Ok(envelope) => match &session_id {
                    Some(id) if envelope.session_id != *id => None,
                    _ => Some(envelope),
                },
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    debug!(skipped, "Event bus subscriber lagged, envelopes dropped");
                    None
                }
            };
            futures::future::ready(keep)
        })
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn published_count(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .field("published_count", &self.published_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Event;

    fn chunk(session_id: &str, sequence: u64) -> EventEnvelope {
        EventEnvelope::new(
            session_id,
            sequence,
            Event::AnswerChunk {
                content: "part".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.publish(chunk("a", 0)), 2);

        assert_eq!(rx1.recv().await.unwrap().session_id, "a");
        assert_eq!(rx2.recv().await.unwrap().session_id, "a");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.publish(chunk("a", 0)), 0);
        assert_eq!(bus.published_count(), 1);
    }

    #[tokio::test]
    async fn test_subscribe_stream_filters_by_session() {
        let bus = EventBus::new();
        let stream = bus.subscribe_stream(Some("b".to_string()));
        tokio::pin!(stream);

        bus.publish(chunk("a", 0));
        bus.publish(chunk("b", 0));
        bus.publish(chunk("a", 1));
        bus.publish(chunk("b", 1));

        let first = stream.next().await.unwrap();
        let second = stream.next().await.unwrap();
        assert_eq!((first.session_id.as_str(), first.sequence), ("b", 0));
        assert_eq!((second.session_id.as_str(), second.sequence), ("b", 1));
    }

    #[tokio::test]
    async fn test_subscribe_stream_skips_lagged_envelopes() {
        let bus = EventBus::with_capacity(2);
        let stream = bus.subscribe_stream(None);
        tokio::pin!(stream);

        for seq in 0..5 {
            bus.publish(chunk("a", seq));
        }

        let next = stream.next().await.unwrap();
        assert_eq!(next.sequence, 3);
        assert_eq!(stream.next().await.unwrap().sequence, 4);

        bus.publish(chunk("a", 5));
        assert_eq!(stream.next().await.unwrap().sequence, 5);
    }

    #[test]
    fn test_clone_shares_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus2.subscribe();
        assert_eq!(bus1.subscriber_count(), 1);
    }
}
