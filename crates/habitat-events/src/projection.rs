//! Derived read models fed by the commit path.
//!
//! The projection cache is not a source of truth: it can be dropped and
//! rebuilt from the store and log at any time. On world reset it must be
//! cleared *before* the store is re-initialized so no reader observes a
//! stale snapshot of the previous world.

use std::collections::VecDeque;
use std::sync::Arc;

use habitat_types::{WorldEvent, WorldSnapshot};
use tokio::sync::RwLock;

/// Default bound on the recent-events projection.
const DEFAULT_RECENT_LIMIT: usize = 100;

/// Interior projection state.
#[derive(Debug)]
struct ProjectionInner {
    /// Recent events, newest first, bounded.
    recent: VecDeque<WorldEvent>,
    /// Bound on `recent`.
    recent_limit: usize,
    /// Lazily rebuilt world snapshot; `None` after invalidation.
    snapshot: Option<WorldSnapshot>,
}

/// Cache of frequently read projections.
///
/// Cheap to clone; clones share the same cache.
#[derive(Debug, Clone)]
pub struct ProjectionCache {
    inner: Arc<RwLock<ProjectionInner>>,
}

impl ProjectionCache {
    /// Create a cache with the default recent-events bound.
    pub fn new() -> Self {
        Self::with_recent_limit(DEFAULT_RECENT_LIMIT)
    }

    /// Create a cache bounding the recent-events projection to `limit`.
    pub fn with_recent_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ProjectionInner {
                recent: VecDeque::new(),
                recent_limit: limit.max(1),
                snapshot: None,
            })),
        }
    }

    /// Push a committed event into the recent-events projection and
    /// invalidate the snapshot (any entity may have mutated).
    pub async fn on_event(&self, event: &WorldEvent) {
        let mut inner = self.inner.write().await;
        inner.recent.push_front(event.clone());
        if inner.recent.len() > inner.recent_limit {
            let _ = inner.recent.pop_back();
        }
        inner.snapshot = None;
    }

    /// The newest `limit` cached events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Vec<WorldEvent> {
        let inner = self.inner.read().await;
        inner.recent.iter().take(limit).cloned().collect()
    }

    /// The cached snapshot, if still valid.
    pub async fn snapshot(&self) -> Option<WorldSnapshot> {
        self.inner.read().await.snapshot.clone()
    }

    /// Store a freshly rebuilt snapshot.
    pub async fn store_snapshot(&self, snapshot: WorldSnapshot) {
        self.inner.write().await.snapshot = Some(snapshot);
    }

    /// Drop the snapshot without touching recent events (entity mutation
    /// outside the event path, e.g. a direct store write).
    pub async fn invalidate_snapshot(&self) {
        self.inner.write().await.snapshot = None;
    }

    /// Drop everything. Must run before the store re-initializes on reset.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.recent.clear();
        inner.snapshot = None;
    }
}

impl Default for ProjectionCache {
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

    fn make_snapshot(tick: u64) -> WorldSnapshot {
        WorldSnapshot {
            tick,
            agents: Vec::new(),
            resource_spawns: Vec::new(),
            shelters: Vec::new(),
            named_locations: std::collections::BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn recent_events_bounded_newest_first() {
        let cache = ProjectionCache::with_recent_limit(3);
        for v in 1..=5 {
            cache.on_event(&make_event(v)).await;
        }
        let recent = cache.recent_events(10).await;
        let versions: Vec<u64> = recent.iter().map(|e| e.version).collect();
        assert_eq!(versions, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn event_invalidates_snapshot() {
        let cache = ProjectionCache::new();
        cache.store_snapshot(make_snapshot(1)).await;
        assert!(cache.snapshot().await.is_some());

        cache.on_event(&make_event(1)).await;
        assert!(cache.snapshot().await.is_none());

        cache.store_snapshot(make_snapshot(2)).await;
        assert_eq!(cache.snapshot().await.unwrap().tick, 2);
    }

    #[tokio::test]
    async fn clear_drops_everything() {
        let cache = ProjectionCache::new();
        cache.on_event(&make_event(1)).await;
        cache.store_snapshot(make_snapshot(1)).await;

        cache.clear().await;
        assert!(cache.recent_events(10).await.is_empty());
        assert!(cache.snapshot().await.is_none());
    }
}
