//! Event bus built on tokio broadcast channels

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::types::{Event, EventEnvelope};

/// Capacity for the broadcast channel
const DEFAULT_CAPACITY: usize = 1000;

/// Best-effort publish/subscribe bus for workflow lifecycle events.
///
/// Publishing never blocks and never fails: with no subscribers the event is
/// dropped, and slow subscribers lose the oldest events once the channel
/// capacity is exceeded.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EventEnvelope>,
    /// Number of events published (for monitoring)
    event_count: Arc<AtomicUsize>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            event_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Publish an envelope to all subscribers.
    ///
    /// Returns the number of subscribers that received it (0 when nobody listens).
    pub fn publish(&self, envelope: EventEnvelope) -> usize {
        self.event_count.fetch_add(1, Ordering::Relaxed);
        self.sender.send(envelope).unwrap_or(0)
    }

    /// Wrap an event in a fresh envelope and publish it.
    pub fn emit(&self, event: Event) -> usize {
        self.publish(EventEnvelope::new(event))
    }

    /// Subscribe to every event published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }

    /// Subscribe to the events of a single workflow.
    pub fn subscribe_workflow(&self, workflow_id: impl Into<String>) -> WorkflowSubscription {
        WorkflowSubscription {
            workflow_id: workflow_id.into(),
            receiver: self.sender.subscribe(),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn event_count(&self) -> usize {
        self.event_count.load(Ordering::Relaxed)
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
            .field("event_count", &self.event_count())
            .finish()
    }
}

/// Receiver filtered down to one workflow id.
pub struct WorkflowSubscription {
    workflow_id: String,
    receiver: broadcast::Receiver<EventEnvelope>,
}

impl WorkflowSubscription {
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Next event for this workflow, or `None` once the bus is gone.
    ///
    /// Lagged gaps are skipped; delivery is best-effort.
    pub async fn recv(&mut self) -> Option<EventEnvelope> {
        loop {
            match self.receiver.recv().await {
                Ok(envelope) => {
                    if envelope.event.workflow_id() == Some(self.workflow_id.as_str()) {
                        return Some(envelope);
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(id: &str) -> Event {
        Event::WorkflowAccepted {
            workflow_id: id.to_string(),
        }
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        let envelope = EventEnvelope::new(accepted("wf-1"));

        let sent = bus.publish(envelope.clone());
        assert_eq!(sent, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.id, envelope.id);
    }

    #[tokio::test]
    async fn test_no_subscribers() {
        let bus = EventBus::new();

        let sent = bus.emit(accepted("wf-1"));
        assert_eq!(sent, 0);
        assert_eq!(bus.event_count(), 1);
    }

    #[tokio::test]
    async fn test_workflow_subscription_filters_other_workflows() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_workflow("wf-2");

        bus.emit(accepted("wf-1"));
        bus.emit(Event::Error {
            message: "unrelated".to_string(),
            workflow_id: None,
        });
        bus.emit(accepted("wf-2"));

        let received = sub.recv().await.unwrap();
        assert_eq!(received.event.workflow_id(), Some("wf-2"));
        assert_eq!(sub.workflow_id(), "wf-2");
    }

    #[tokio::test]
    async fn test_workflow_subscription_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut sub = bus.subscribe_workflow("wf-1");
        drop(bus);

        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_workflow_subscription_survives_lag() {
        let bus = EventBus::with_capacity(2);
        let mut sub = bus.subscribe_workflow("wf-1");

        for _ in 0..5 {
            bus.emit(accepted("wf-0"));
        }
        bus.emit(accepted("wf-1"));

        let received = sub.recv().await.unwrap();
        assert_eq!(received.event.workflow_id(), Some("wf-1"));
    }

    #[test]
    fn test_clone_shares_channel() {
        let bus1 = EventBus::new();
        let bus2 = bus1.clone();

        let _rx = bus2.subscribe();
        assert_eq!(bus1.subscriber_count(), 1);
        assert_eq!(bus2.subscriber_count(), 1);
    }
}
