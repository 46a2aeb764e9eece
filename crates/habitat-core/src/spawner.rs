//! World population: seed agents, resource spawns, and shelters.
//!
//! Positions and biomes come from the world RNG's spawn stream, so a
//! given `(seed, settings, agent configs)` triple always produces the
//! same world. The spawner writes entities through the store and returns
//! `agent_spawned` drafts for the engine to commit.

use chrono::Utc;
use habitat_types::{
    Agent, AgentConfig, AgentId, AgentLifeState, Biome, EventDraft, EventType, ResourceKind,
    ResourceSpawn, Shelter, ShelterId, SpawnId, WorldSize,
};
use habitat_world::WorldStore;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use uuid::Uuid;

/// Derive a UUID from the spawn RNG stream.
///
/// Entity identity is part of the seeded world: two runs from the same
/// seed produce the same ids, which is what lets determinism checks
/// compare event streams across runs.
fn seeded_uuid(rng: &mut ChaCha8Rng) -> Uuid {
    Uuid::from_u64_pair(rng.random(), rng.random())
}

/// Display palette cycled across agents without a configured color.
const COLOR_PALETTE: &[&str] = &[
    "#e06c75", "#61afef", "#98c379", "#d19a66", "#c678dd", "#56b6c2", "#abb2bf", "#e5c07b",
];

/// Biomes drawn for resource spawns.
const BIOMES: &[Biome] = &[
    Biome::Forest,
    Biome::Plains,
    Biome::Desert,
    Biome::Mountain,
    Biome::Lake,
];

/// World population settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnSettings {
    /// Agents to create when no explicit configs are supplied.
    #[serde(default = "default_initial_agents")]
    pub initial_agents: u32,

    /// Policy type for agents without one configured.
    #[serde(default = "default_policy")]
    pub default_policy: String,

    /// Food spawn count.
    #[serde(default = "default_food_spawns")]
    pub food_spawns: u32,

    /// Energy spawn count.
    #[serde(default = "default_energy_spawns")]
    pub energy_spawns: u32,

    /// Material spawn count.
    #[serde(default = "default_material_spawns")]
    pub material_spawns: u32,

    /// Shelter count.
    #[serde(default = "default_shelters")]
    pub shelters: u32,

    /// Starting units on each spawn.
    #[serde(default = "default_initial_amount")]
    pub spawn_initial_amount: u64,

    /// Capacity ceiling on each spawn.
    #[serde(default = "default_max_amount")]
    pub spawn_max_amount: u64,

    /// Regeneration per tick on each spawn.
    #[serde(default = "default_regen_rate")]
    pub spawn_regen_rate: u64,

    /// Starting balance for each agent.
    #[serde(default = "default_starting_balance")]
    pub starting_balance: u64,
}

const fn default_initial_agents() -> u32 {
    5
}

fn default_policy() -> String {
    String::from("fallback")
}

const fn default_food_spawns() -> u32 {
    12
}

const fn default_energy_spawns() -> u32 {
    8
}

const fn default_material_spawns() -> u32 {
    6
}

const fn default_shelters() -> u32 {
    4
}

const fn default_initial_amount() -> u64 {
    10
}

const fn default_max_amount() -> u64 {
    20
}

const fn default_regen_rate() -> u64 {
    1
}

const fn default_starting_balance() -> u64 {
    20
}

impl Default for SpawnSettings {
    fn default() -> Self {
        Self {
            initial_agents: default_initial_agents(),
            default_policy: default_policy(),
            food_spawns: default_food_spawns(),
            energy_spawns: default_energy_spawns(),
            material_spawns: default_material_spawns(),
            shelters: default_shelters(),
            spawn_initial_amount: default_initial_amount(),
            spawn_max_amount: default_max_amount(),
            spawn_regen_rate: default_regen_rate(),
            starting_balance: default_starting_balance(),
        }
    }
}

impl SpawnSettings {
    /// Default agent configs when a variant supplies none: `initial_agents`
    /// anonymous agents on the default policy.
    pub fn default_agent_configs(&self) -> Vec<AgentConfig> {
        (0..self.initial_agents)
            .map(|i| AgentConfig {
                name: format!("agent-{i}"),
                policy_type: self.default_policy.clone(),
                x: None,
                y: None,
                color: None,
                personality: None,
            })
            .collect()
    }
}

/// Populate the world: resource spawns, shelters, then agents.
///
/// Returns the `agent_spawned` event drafts for the engine to commit at
/// tick zero.
pub async fn spawn_world(
    store: &WorldStore,
    size: WorldSize,
    agent_configs: &[AgentConfig],
    settings: &SpawnSettings,
    rng: &mut ChaCha8Rng,
) -> Vec<EventDraft> {
    let kinds = [
        (ResourceKind::Food, settings.food_spawns),
        (ResourceKind::Energy, settings.energy_spawns),
        (ResourceKind::Material, settings.material_spawns),
    ];
    for (kind, count) in kinds {
        for _ in 0..count {
            let (x, y) = random_cell(size, rng);
            let biome = BIOMES[rng.random_range(0..BIOMES.len())];
            store
                .insert_spawn(ResourceSpawn {
                    id: SpawnId::from(seeded_uuid(rng)),
                    x,
                    y,
                    kind,
                    current_amount: settings.spawn_initial_amount,
                    max_amount: settings.spawn_max_amount,
                    regen_rate: settings.spawn_regen_rate,
                    biome,
                })
                .await;
        }
    }

    for _ in 0..settings.shelters {
        let (x, y) = random_cell(size, rng);
        store
            .insert_shelter(Shelter {
                id: ShelterId::from(seeded_uuid(rng)),
                x,
                y,
                can_sleep: true,
                owner_agent: None,
            })
            .await;
    }

    let mut events = Vec::with_capacity(agent_configs.len());
    for (index, config) in agent_configs.iter().enumerate() {
        let (x, y) = match (config.x, config.y) {
            (Some(x), Some(y)) => (x, y),
            _ => random_cell(size, rng),
        };
        let color = config
            .color
            .clone()
            .unwrap_or_else(|| COLOR_PALETTE[index % COLOR_PALETTE.len()].to_owned());
        let agent = Agent {
            id: AgentId::from(seeded_uuid(rng)),
            name: config.name.clone(),
            policy_type: config.policy_type.clone(),
            x,
            y,
            hunger: 100.0,
            energy: 100.0,
            health: 100.0,
            balance: Decimal::from(settings.starting_balance),
            state: AgentLifeState::Idle,
            color,
            personality: config.personality.clone(),
            spawn_index: u32::try_from(index).unwrap_or(u32::MAX),
            sleep_ticks_remaining: 0,
            died_at: None,
            death_cause: None,
            inventory: std::collections::BTreeMap::new(),
            knowledge: std::collections::BTreeMap::new(),
            memories: Vec::new(),
            created_at: Utc::now(),
        };
        events.push(EventDraft::for_agent(
            EventType::AgentSpawned,
            agent.id,
            json!({
                "name": agent.name,
                "policyType": agent.policy_type,
                "x": x,
                "y": y,
            }),
        ));
        store.insert_agent(agent).await;
    }

    info!(
        agents = agent_configs.len(),
        shelters = settings.shelters,
        "World spawned"
    );
    events
}

/// A uniformly random in-bounds cell.
fn random_cell(size: WorldSize, rng: &mut ChaCha8Rng) -> (i32, i32) {
    let x = rng.random_range(0..size.width.max(1));
    let y = rng.random_range(0..size.height.max(1));
    (
        i32::try_from(x).unwrap_or(0),
        i32::try_from(y).unwrap_or(0),
    )
}
