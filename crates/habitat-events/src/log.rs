//! The append-only event log with a global version counter.
//!
//! Every committed event carries a `version` that is strictly increasing
//! and gap-free, including across restarts: [`EventLog::init_global_version`]
//! re-seeds the counter from the durable maximum before the engine accepts
//! new events. Version assignment happens under the log's write lock, so
//! log order and version order are always the same.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use habitat_types::{AgentId, EventDraft, WorldEvent};
use tokio::sync::RwLock;
use tracing::debug;

/// Default number of events retained in memory. Older events remain only
/// in the relational store; replay reads beyond the ring fall through to it.
const DEFAULT_RETENTION: usize = 100_000;

/// Interior log state.
#[derive(Debug)]
struct LogInner {
    /// Retained events, oldest first.
    events: VecDeque<WorldEvent>,
    /// Last assigned version; 0 means nothing appended yet.
    version: u64,
    /// Maximum events retained in memory.
    retention: usize,
}

/// The append-only, globally versioned event log.
///
/// Cheap to clone; clones share the same log.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<RwLock<LogInner>>,
}

impl EventLog {
    /// Create an empty log with default in-memory retention.
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETENTION)
    }

    /// Create an empty log retaining at most `retention` events in memory.
    pub fn with_retention(retention: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(LogInner {
                events: VecDeque::new(),
                version: 0,
                retention: retention.max(1),
            })),
        }
    }

    /// Re-seed the version counter from the durable high-water mark.
    ///
    /// Must run before the engine appends new events on startup, otherwise
    /// versions would collide with rows already persisted. Never moves the
    /// counter backwards.
    pub async fn init_global_version(&self, durable_max: u64) {
        let mut inner = self.inner.write().await;
        if durable_max > inner.version {
            inner.version = durable_max;
        }
        debug!(version = inner.version, "Event version counter initialized");
    }

    /// The largest assigned version (0 if nothing has been appended).
    pub async fn current_version(&self) -> u64 {
        self.inner.read().await.version
    }

    /// Append a draft, assigning the next version. Returns the committed
    /// event.
    pub async fn append(&self, tick: u64, draft: EventDraft) -> WorldEvent {
        let mut inner = self.inner.write().await;
        inner.version += 1;
        let event = WorldEvent {
            version: inner.version,
            tick,
            event_type: draft.event_type,
            agent_id: draft.agent_id,
            payload: draft.payload,
            created_at: Utc::now(),
        };
        inner.events.push_back(event.clone());
        if inner.events.len() > inner.retention {
            let _ = inner.events.pop_front();
        }
        event
    }

    /// The newest `limit` events, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<WorldEvent> {
        let inner = self.inner.read().await;
        inner.events.iter().rev().take(limit).cloned().collect()
    }

    /// All retained events at an exact tick, version order.
    pub async fn at_tick(&self, tick: u64) -> Vec<WorldEvent> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .filter(|e| e.tick == tick)
            .cloned()
            .collect()
    }

    /// Retained events with `from <= tick <= to`, version order, capped at
    /// `limit`.
    pub async fn in_range(&self, from: u64, to: u64, limit: usize) -> Vec<WorldEvent> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .filter(|e| e.tick >= from && e.tick <= to)
            .take(limit)
            .cloned()
            .collect()
    }

    /// The newest `limit` retained events involving an agent, newest first.
    pub async fn agent_timeline(&self, agent_id: AgentId, limit: usize) -> Vec<WorldEvent> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .rev()
            .filter(|e| e.agent_id == Some(agent_id))
            .take(limit)
            .cloned()
            .collect()
    }

    /// Distinct ticks with at least one retained event, ascending.
    pub async fn ticks(&self) -> Vec<u64> {
        let inner = self.inner.read().await;
        let mut ticks: Vec<u64> = inner.events.iter().map(|e| e.tick).collect();
        ticks.dedup();
        ticks
    }

    /// Drop all retained events. The version counter is preserved --
    /// versions stay strictly increasing across a world reset.
    pub async fn clear_retained(&self) {
        let mut inner = self.inner.write().await;
        inner.events.clear();
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use habitat_types::EventType;
    use serde_json::json;

    use super::*;

    fn draft(event_type: EventType) -> EventDraft {
        EventDraft {
            event_type,
            agent_id: None,
            payload: json!({}),
        }
    }

    #[tokio::test]
    async fn versions_are_strictly_increasing_and_gap_free() {
        let log = EventLog::new();
        let mut last = 0;
        for tick in 1..=20 {
            let event = log.append(tick, draft(EventType::TickEnd)).await;
            assert_eq!(event.version, last + 1, "gap-free");
            last = event.version;
        }
        assert_eq!(log.current_version().await, 20);
    }

    #[tokio::test]
    async fn init_global_version_seeds_high_water_mark() {
        let log = EventLog::new();
        log.init_global_version(500).await;
        let event = log.append(1, draft(EventType::TickEnd)).await;
        assert_eq!(event.version, 501);

        // Never moves backwards.
        log.init_global_version(10).await;
        let event = log.append(1, draft(EventType::TickEnd)).await;
        assert_eq!(event.version, 502);
    }

    #[tokio::test]
    async fn concurrent_appends_never_collide() {
        let log = EventLog::new();
        let mut tasks = Vec::new();
        for _ in 0..10 {
            let log = log.clone();
            tasks.push(tokio::spawn(async move {
                let mut versions = Vec::new();
                for _ in 0..50 {
                    versions.push(log.append(1, draft(EventType::TickEnd)).await.version);
                }
                versions
            }));
        }
        let mut all = Vec::new();
        for task in tasks {
            all.extend(task.await.unwrap());
        }
        all.sort_unstable();
        let expected: Vec<u64> = (1..=500).collect();
        assert_eq!(all, expected, "every version assigned exactly once");
    }

    #[tokio::test]
    async fn range_and_tick_queries() {
        let log = EventLog::new();
        for tick in 1..=5 {
            let _ = log.append(tick, draft(EventType::TickEnd)).await;
            let _ = log.append(tick, draft(EventType::NeedsUpdated)).await;
        }

        assert_eq!(log.at_tick(3).await.len(), 2);
        assert_eq!(log.in_range(2, 4, 100).await.len(), 6);
        assert_eq!(log.in_range(2, 4, 4).await.len(), 4);
        assert_eq!(log.ticks().await, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn agent_timeline_filters_and_orders() {
        let log = EventLog::new();
        let agent = AgentId::new();
        let other = AgentId::new();
        for tick in 1..=3 {
            let _ = log
                .append(
                    tick,
                    EventDraft::for_agent(EventType::AgentMoved, agent, json!({"tick": tick})),
                )
                .await;
            let _ = log
                .append(
                    tick,
                    EventDraft::for_agent(EventType::AgentMoved, other, json!({})),
                )
                .await;
        }
        let timeline = log.agent_timeline(agent, 2).await;
        assert_eq!(timeline.len(), 2);
        assert_eq!(timeline[0].tick, 3, "newest first");
        assert!(timeline.iter().all(|e| e.agent_id == Some(agent)));
    }

    #[tokio::test]
    async fn retention_drops_oldest_but_keeps_versions() {
        let log = EventLog::with_retention(5);
        for tick in 1..=10 {
            let _ = log.append(tick, draft(EventType::TickEnd)).await;
        }
        let recent = log.recent(100).await;
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].version, 10);
        assert_eq!(log.current_version().await, 10);
    }

    #[tokio::test]
    async fn clear_retained_preserves_version_counter() {
        let log = EventLog::new();
        for tick in 1..=3 {
            let _ = log.append(tick, draft(EventType::TickEnd)).await;
        }
        log.clear_retained().await;
        assert!(log.recent(10).await.is_empty());
        let event = log.append(1, draft(EventType::WorldReset)).await;
        assert_eq!(event.version, 4);
    }
}
