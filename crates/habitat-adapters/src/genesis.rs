//! Genesis: LLM meta-generation of agent rosters.
//!
//! Genesis runs once, before a simulation starts. Given a policy type and
//! a head count it asks the backing model to invent names and
//! personalities, caches the result under
//! `genesis-cache:{policyType}:{hash}` so reruns with the same inputs are
//! free, and falls back to a deterministic seeded roster whenever the LLM
//! path is unavailable or returns garbage.

use habitat_db::kv::genesis_cache_key;
use habitat_db::KvCache;
use habitat_types::AgentConfig;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::adapter::AdapterLayer;
use crate::prompt::RenderedPrompt;

/// Built-in pool of agent names for the deterministic roster. Picked
/// without replacement, shuffled by the world seed.
const NAME_POOL: &[&str] = &[
    "Alder", "Birch", "Cedar", "Dusk", "Ember", "Fern", "Grove", "Haze", "Iris", "Juniper",
    "Kestrel", "Lark", "Moss", "Nettle", "Oak", "Pine", "Quill", "Reed", "Sage", "Thorn",
    "Umber", "Vale", "Wren", "Yarrow", "Zephyr", "Ash", "Brook", "Clay", "Dawn", "Elm",
    "Flint", "Gale", "Heath", "Ivy", "Jay", "Kale", "Lichen", "Maple", "Nyx", "Onyx",
];

/// Display palette cycled across the roster.
const COLOR_PALETTE: &[&str] = &[
    "#e06c75", "#61afef", "#98c379", "#d19a66", "#c678dd", "#56b6c2", "#abb2bf", "#e5c07b",
];

/// Personality seeds for the deterministic roster.
const PERSONALITY_POOL: &[&str] = &[
    "cautious and frugal",
    "bold and generous",
    "curious wanderer",
    "suspicious hoarder",
    "industrious planner",
    "easygoing opportunist",
];

/// Genesis configuration (the `GENESIS_CACHE_*` environment surface).
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, Deserialize)]
pub struct GenesisSettings {
    /// Whether genesis results are cached at all.
    pub cache_enabled: bool,
    /// TTL for cached rosters, seconds.
    pub cache_ttl_seconds: i64,
    /// Key prefix (`GENESIS_CACHE_PREFIX`).
    pub cache_prefix: String,
}

impl Default for GenesisSettings {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl_seconds: habitat_db::kv::DEFAULT_RESPONSE_TTL_SECONDS,
            cache_prefix: habitat_db::kv::GENESIS_CACHE_PREFIX.to_owned(),
        }
    }
}

/// One roster entry as the model is asked to emit it.
#[derive(Debug, Deserialize)]
struct RosterEntry {
    name: String,
    #[serde(default)]
    personality: Option<String>,
}

/// The genesis client.
pub struct GenesisClient {
    kv: Option<KvCache>,
    settings: GenesisSettings,
}

impl GenesisClient {
    /// Create a client with an optional KV cache.
    pub const fn new(settings: GenesisSettings, kv: Option<KvCache>) -> Self {
        Self { kv, settings }
    }

    /// Generate `count` agent configs for a policy type.
    ///
    /// Cached LLM rosters are reused; LLM failure of any kind degrades to
    /// the deterministic seeded roster. Never fails.
    pub async fn generate_roster(
        &self,
        layer: &AdapterLayer,
        policy_type: &str,
        count: u32,
        world_seed: u64,
    ) -> Vec<AgentConfig> {
        let key = self.cache_key(policy_type, count, world_seed);

        if self.settings.cache_enabled
            && let Some(kv) = &self.kv
            && let Ok(cached) = kv.get_json::<Vec<AgentConfig>>(&key).await
        {
            debug!(policy_type, count, "Genesis cache hit");
            return cached;
        }

        match self.generate_via_llm(layer, policy_type, count).await {
            Some(roster) => {
                if self.settings.cache_enabled
                    && let Some(kv) = &self.kv
                    && let Err(err) = kv
                        .set_json(&key, &roster, self.settings.cache_ttl_seconds)
                        .await
                {
                    warn!(%err, "Genesis cache write failed");
                }
                roster
            }
            None => deterministic_roster(policy_type, count, world_seed),
        }
    }

    /// The cache key for `(policy, count, seed)`.
    fn cache_key(&self, policy_type: &str, count: u32, world_seed: u64) -> String {
        let mut hasher = Sha256::new();
        hasher.update(count.to_le_bytes());
        hasher.update(world_seed.to_le_bytes());
        let hash = hex::encode(hasher.finalize());
        genesis_cache_key(&self.settings.cache_prefix, policy_type, &hash)
    }

    /// Ask the model for a roster; `None` on any failure.
    async fn generate_via_llm(
        &self,
        layer: &AdapterLayer,
        policy_type: &str,
        count: u32,
    ) -> Option<Vec<AgentConfig>> {
        let prompt = RenderedPrompt {
            system: String::from(
                "You invent inhabitants for a survival simulation. \
                 Respond with a JSON array and nothing else.",
            ),
            user: format!(
                "Invent {count} distinct inhabitants. Respond as a JSON array of \
                 objects with \"name\" (one word) and \"personality\" (one short phrase)."
            ),
        };

        let result = match layer.call_with_raw_prompt(policy_type, &prompt).await {
            Ok(result) => result,
            Err(err) => {
                warn!(policy_type, %err, "Genesis LLM call failed; using seeded roster");
                return None;
            }
        };

        let entries: Vec<RosterEntry> = match serde_json::from_str(result.response.trim()) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(policy_type, %err, "Genesis response unparsable; using seeded roster");
                return None;
            }
        };
        if entries.is_empty() {
            return None;
        }

        Some(
            entries
                .into_iter()
                .take(count as usize)
                .enumerate()
                .map(|(i, entry)| AgentConfig {
                    name: entry.name,
                    policy_type: policy_type.to_owned(),
                    x: None,
                    y: None,
                    color: Some(palette_color(i)),
                    personality: entry.personality,
                })
                .collect(),
        )
    }
}

/// The deterministic roster: seeded shuffle of the name pool, cycled
/// personalities and colors. Identical inputs yield identical rosters.
pub fn deterministic_roster(policy_type: &str, count: u32, world_seed: u64) -> Vec<AgentConfig> {
    let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(world_seed);
    let mut names: Vec<&str> = NAME_POOL.to_vec();
    names.shuffle(&mut rng);

    (0..count as usize)
        .map(|i| AgentConfig {
            // Wrap with a numeric suffix when the pool runs out.
            name: names.get(i).map_or_else(
                || format!("{}-{}", names[i % names.len()], i / names.len() + 1),
                |n| (*n).to_owned(),
            ),
            policy_type: policy_type.to_owned(),
            x: None,
            y: None,
            color: Some(palette_color(i)),
            personality: Some(PERSONALITY_POOL[i % PERSONALITY_POOL.len()].to_owned()),
        })
        .collect()
}

/// Cycle the display palette.
fn palette_color(index: usize) -> String {
    COLOR_PALETTE[index % COLOR_PALETTE.len()].to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_roster_is_reproducible() {
        let a = deterministic_roster("fallback", 8, 42);
        let b = deterministic_roster("fallback", 8, 42);
        assert_eq!(a, b);
    }

    #[test]
    fn different_seeds_differ() {
        let a = deterministic_roster("fallback", 8, 42);
        let b = deterministic_roster("fallback", 8, 43);
        let names_a: Vec<&str> = a.iter().map(|c| c.name.as_str()).collect();
        let names_b: Vec<&str> = b.iter().map(|c| c.name.as_str()).collect();
        assert_ne!(names_a, names_b);
    }

    #[test]
    fn roster_names_are_unique_within_pool() {
        let roster = deterministic_roster("fallback", 20, 7);
        let mut names: Vec<&String> = roster.iter().map(|c| &c.name).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 20);
    }

    #[test]
    fn roster_overflows_pool_gracefully() {
        let roster = deterministic_roster("fallback", 60, 7);
        assert_eq!(roster.len(), 60);
    }

    #[test]
    fn cache_keys_depend_on_inputs() {
        let client = GenesisClient::new(GenesisSettings::default(), None);
        let a = client.cache_key("claude", 10, 42);
        let b = client.cache_key("claude", 10, 43);
        let c = client.cache_key("gpt-4o", 10, 42);
        assert_ne!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("genesis-cache:claude:"));
    }
}
