//! The LLM response cache.
//!
//! Keyed by a fingerprint of the cache-relevant observation state. A hit
//! is functionally substitutable for a fresh call: the cached decision
//! already passed the same parse-and-validate path, and callers re-run
//! validation on hits anyway. Entries carry a long TTL (7 days by
//! default) and write through to the Redis KV when one is configured.
//! Fallback decisions are never inserted.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use habitat_db::kv::llm_cache_key;
use habitat_db::KvCache;
use habitat_types::{AgentDecision, Observation};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

/// Compute the fingerprint of an observation's cache-relevant state.
///
/// Salient fields only: position, vitals (rounded to whole points --
/// fractional decay should not bust the cache every tick), inventory,
/// nearby spawns, and the policy type. Nearby agents and recent events
/// are deliberately excluded: they churn every tick without changing
/// what a survival decision should be.
pub fn observation_fingerprint(policy_type: &str, observation: &Observation) -> String {
    let spawns: Vec<serde_json::Value> = observation
        .nearby_resource_spawns
        .iter()
        .map(|s| {
            serde_json::json!({
                "x": s.x,
                "y": s.y,
                "kind": s.kind,
                "amount": s.current_amount,
            })
        })
        .collect();

    let salient = serde_json::json!({
        "policyType": policy_type,
        "x": observation.self_view.x,
        "y": observation.self_view.y,
        "hunger": observation.self_view.hunger.round() as i64,
        "energy": observation.self_view.energy.round() as i64,
        "health": observation.self_view.health.round() as i64,
        "balance": observation.self_view.balance,
        "inventory": observation.inventory,
        "spawns": spawns,
        "atShelter": observation.at_shelter(),
    });

    let canonical = salient.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hit/miss counters for the status endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CacheStats {
    /// Lookups answered from cache.
    pub hits: u64,
    /// Lookups that went to a backend.
    pub misses: u64,
    /// Entries currently in memory.
    pub entries: usize,
}

/// One cached decision with its expiry.
#[derive(Debug, Clone)]
struct CacheEntry {
    decision: AgentDecision,
    expires_at: Instant,
}

/// The in-memory response cache with optional KV write-through.
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Arc<RwLock<BTreeMap<String, CacheEntry>>>,
    ttl: Duration,
    kv: Option<KvCache>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
}

impl ResponseCache {
    /// Create a cache with the given TTL and optional KV mirror.
    pub fn new(ttl_seconds: i64, kv: Option<KvCache>) -> Self {
        let ttl = Duration::from_secs(u64::try_from(ttl_seconds.max(1)).unwrap_or(1));
        Self {
            entries: Arc::new(RwLock::new(BTreeMap::new())),
            ttl,
            kv,
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Look up a decision for `(policy_type, fingerprint)`.
    ///
    /// Memory first; on a memory miss, the KV mirror (a KV hit re-warms
    /// memory). Expired entries count as misses.
    pub async fn get(&self, policy_type: &str, fingerprint: &str) -> Option<AgentDecision> {
        let key = llm_cache_key(policy_type, fingerprint);

        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(&key)
                && entry.expires_at > Instant::now()
            {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(entry.decision.clone());
            }
        }

        if let Some(kv) = &self.kv
            && let Ok(decision) = kv.get_json::<AgentDecision>(&key).await
        {
            self.hits.fetch_add(1, Ordering::Relaxed);
            let mut entries = self.entries.write().await;
            entries.insert(
                key,
                CacheEntry {
                    decision: decision.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
            return Some(decision);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Insert a decision. Concurrent writes for the same fingerprint are
    /// last-writer-wins; semantically equivalent decisions make that
    /// harmless.
    pub async fn insert(&self, policy_type: &str, fingerprint: &str, decision: &AgentDecision) {
        let key = llm_cache_key(policy_type, fingerprint);

        {
            let mut entries = self.entries.write().await;
            entries.insert(
                key.clone(),
                CacheEntry {
                    decision: decision.clone(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }

        if let Some(kv) = &self.kv {
            let ttl_seconds = i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX);
            if let Err(err) = kv.set_json(&key, decision, ttl_seconds).await {
                debug!(%err, "KV write-through failed; memory cache still serves");
            }
        }
    }

    /// Drop everything in memory (the KV mirror is flushed separately on
    /// world reset).
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.entries.read().await.len(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap as Map;

    use habitat_types::{
        ActionParams, AgentId, AgentLifeState, Observation, SelfView, WorldSize,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn make_observation(hunger: f64) -> Observation {
        Observation {
            self_view: SelfView {
                id: AgentId::new(),
                name: String::from("A"),
                x: 3,
                y: 4,
                hunger,
                energy: 70.0,
                health: 100.0,
                balance: Decimal::from(5),
                state: AgentLifeState::Idle,
                policy_type: String::from("claude"),
                personality: None,
            },
            inventory: Map::new(),
            nearby_agents: Vec::new(),
            nearby_resource_spawns: Vec::new(),
            nearby_shelters: Vec::new(),
            recent_events: Vec::new(),
            tick: 1,
            world_size: WorldSize::default(),
        }
    }

    #[test]
    fn identical_salient_state_same_fingerprint() {
        let a = make_observation(60.0);
        let mut b = make_observation(60.0);
        // Ids and tick differ; neither is salient.
        b.tick = 99;
        assert_eq!(
            observation_fingerprint("claude", &a),
            observation_fingerprint("claude", &b)
        );
    }

    #[test]
    fn vitals_round_to_whole_points() {
        let a = make_observation(60.2);
        let b = make_observation(60.4);
        let c = make_observation(61.0);
        assert_eq!(
            observation_fingerprint("claude", &a),
            observation_fingerprint("claude", &b)
        );
        assert_ne!(
            observation_fingerprint("claude", &a),
            observation_fingerprint("claude", &c)
        );
    }

    #[test]
    fn policy_type_is_salient() {
        let obs = make_observation(60.0);
        assert_ne!(
            observation_fingerprint("claude", &obs),
            observation_fingerprint("gpt-4o", &obs)
        );
    }

    #[tokio::test]
    async fn cache_round_trip_and_stats() {
        let cache = ResponseCache::new(3600, None);
        let decision = AgentDecision::new(ActionParams::Sleep { duration: 2 });

        assert!(cache.get("claude", "fp1").await.is_none());
        cache.insert("claude", "fp1", &decision).await;
        assert_eq!(cache.get("claude", "fp1").await, Some(decision));

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = ResponseCache::new(1, None);
        let decision = AgentDecision::new(ActionParams::Sleep { duration: 1 });
        cache.insert("claude", "fp1", &decision).await;

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.get("claude", "fp1").await.is_none());
    }

    #[tokio::test]
    async fn clear_empties_memory() {
        let cache = ResponseCache::new(3600, None);
        let decision = AgentDecision::new(ActionParams::Claim {});
        cache.insert("claude", "fp1", &decision).await;
        cache.clear().await;
        assert!(cache.get("claude", "fp1").await.is_none());
    }
}
