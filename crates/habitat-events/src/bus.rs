//! Lossy pub/sub fanout of committed events.
//!
//! Built on [`tokio::sync::broadcast`]: publishing never blocks, and a
//! subscriber that falls more than the channel capacity behind loses its
//! oldest undelivered events (it observes a `Lagged` error and resumes at
//! the newest). The bus is a view for live consumers -- the event log is
//! the record.

use habitat_types::WorldEvent;
use tokio::sync::broadcast;

/// Capacity of the broadcast channel. A subscriber further behind than
/// this many events skips ahead.
const BROADCAST_CAPACITY: usize = 512;

/// Pub/sub fanout of committed [`WorldEvent`]s.
///
/// Cheap to clone; clones publish into the same channel.
#[derive(Debug, Clone)]
pub struct BroadcastBus {
    tx: broadcast::Sender<WorldEvent>,
}

impl BroadcastBus {
    /// Create a bus with the default capacity.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribe to committed events from this point forward.
    pub fn subscribe(&self) -> broadcast::Receiver<WorldEvent> {
        self.tx.subscribe()
    }

    /// Publish a committed event to all subscribers.
    ///
    /// Returns the number of receivers that got the message; 0 when no
    /// subscriber is connected, which is not an error.
    pub fn publish(&self, event: &WorldEvent) -> usize {
        // send errs only when there are zero receivers, which is the
        // normal idle state.
        self.tx.send(event.clone()).unwrap_or(0)
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for BroadcastBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use habitat_types::EventType;
    use serde_json::json;

    use super::*;

    fn make_event(version: u64) -> WorldEvent {
        WorldEvent {
            version,
            tick: 1,
            event_type: EventType::TickEnd,
            agent_id: None,
            payload: json!({}),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_fine() {
        let bus = BroadcastBus::new();
        assert_eq!(bus.publish(&make_event(1)), 0);
    }

    #[tokio::test]
    async fn subscribers_receive_in_commit_order() {
        let bus = BroadcastBus::new();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _ = bus.publish(&make_event(1));
        let _ = bus.publish(&make_event(2));

        assert_eq!(rx.recv().await.unwrap().version, 1);
        assert_eq!(rx.recv().await.unwrap().version, 2);
    }

    #[tokio::test]
    async fn slow_subscriber_lags_instead_of_blocking() {
        let bus = BroadcastBus::new();
        let mut rx = bus.subscribe();

        // Overflow the channel without the subscriber draining.
        for v in 0..2000 {
            let _ = bus.publish(&make_event(v));
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                assert!(skipped > 0);
            }
            other => {
                // Some tokio versions deliver the oldest retained event
                // first; either way nothing blocked.
                assert!(other.is_ok());
            }
        }
    }
}
