//! Bounded per-session event channel

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

use crate::types::EventEnvelope;

/// Default number of envelopes buffered before the producer waits
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Create a bounded channel for one session's events
pub fn channel(capacity: usize) -> (EventSender, EventStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, EventStream { rx })
}

/// Producer half, held by the orchestrator running the session
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<EventEnvelope>,
}

impl EventSender {
    /// Send an envelope, waiting for buffer space.
    ///
    /// Returns `false` once the consumer has detached; the envelope is dropped.
    pub async fn send(&self, envelope: EventEnvelope) -> bool {
        self.tx.send(envelope).await.is_ok()
    }

    /// Non-blocking send for contexts that cannot await (e.g. `Drop`)
    pub fn try_send(&self, envelope: EventEnvelope) -> bool {
        self.tx.try_send(envelope).is_ok()
    }

    /// Whether the consumer has dropped its stream
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl std::fmt::Debug for EventSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSender")
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Consumer half handed to the caller of `Run`.
///
/// Ends (yields `None`) after the producer is gone, so it never hangs even
/// if the terminal event could not be delivered.
pub struct EventStream {
    rx: mpsc::Receiver<EventEnvelope>,
}

impl EventStream {
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        self.rx.recv().await
    }

    /// Drain the stream until the producer finishes
    pub async fn collect_all(mut self) -> Vec<EventEnvelope> {
        let mut envelopes = Vec::new();
        while let Some(envelope) = self.rx.recv().await {
            envelopes.push(envelope);
        }
        envelopes
    }
}

impl Stream for EventStream {
    type Item = EventEnvelope;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
