//! Change notifications for the presentation layer.
//!
//! Stores publish on a single broadcast channel, so subscribers observe
//! events in the order the stores produced them.

use crate::error::StoreError;
use std::fmt;
use tokio::sync::broadcast;
use tracing::{trace, warn};

const DEFAULT_CAPACITY: usize = 64;

/// Which store an event concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Auth,
    Papers,
    References,
    Citations,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Resource::Auth => "auth",
            Resource::Papers => "papers",
            Resource::References => "references",
            Resource::Citations => "citations",
        };
        f.write_str(name)
    }
}

/// Something observable changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    SessionEstablished { user_id: i64 },
    PapersChanged,
    ReferencesChanged,
    CitationsChanged { paper_id: i64 },
    /// A store operation failed; `message` is ready for display.
    OperationFailed { resource: Resource, message: String },
}

/// Broadcast fan-out of [`StoreEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<StoreEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: StoreEvent) {
        // No subscribers is normal (CLI use, tests).
        if self.sender.send(event).is_err() {
            trace!("Store event dropped, no subscribers");
        }
    }

    /// Log and publish a failed operation. Superseded loads are silent.
    pub(crate) fn report_failure(&self, resource: Resource, error: &StoreError) {
        if matches!(error, StoreError::Superseded) {
            return;
        }
        warn!(resource = %resource, error = %error, "Store operation failed");
        self.publish(StoreEvent::OperationFailed {
            resource,
            message: error.user_message(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_events_arrive_in_publish_order() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.publish(StoreEvent::PapersChanged);
        bus.publish(StoreEvent::CitationsChanged { paper_id: 3 });

        assert_eq!(rx.recv().await.unwrap(), StoreEvent::PapersChanged);
        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::CitationsChanged { paper_id: 3 }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        bus.publish(StoreEvent::ReferencesChanged);
    }

    #[tokio::test]
    async fn test_report_failure_skips_superseded() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();

        bus.report_failure(Resource::Papers, &StoreError::Superseded);
        bus.report_failure(Resource::Papers, &StoreError::NotAuthenticated);

        assert_eq!(
            rx.recv().await.unwrap(),
            StoreEvent::OperationFailed {
                resource: Resource::Papers,
                message: "Please log in first".into(),
            }
        );
        assert!(rx.try_recv().is_err());
    }
}
