//! Core entity structs for the Habitat simulation.
//!
//! These are the records held by the world store and the event log. Vitals
//! are `f64` in the `0.0..=100.0` range (needs decay in fractional steps);
//! money is [`Decimal`] -- never floating point.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{
    AgentLifeState, Biome, DeathCause, EventType, ExperimentStatus, ItemType, ResourceKind,
    VariantStatus,
};
use crate::ids::{AgentId, ExperimentId, ExternalAgentId, ShelterId, SpawnId, VariantId};

/// Upper bound for every vital stat (hunger, energy, health).
pub const VITAL_MAX: f64 = 100.0;

/// Maximum number of memories retained per agent (oldest dropped first).
pub const MEMORY_LIMIT: usize = 50;

/// An autonomous agent on the grid.
///
/// Created at spawn or genesis; mutated only by action handlers and the
/// environment pass; never deleted -- death is a state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Which decision policy drives this agent (adapter registry key,
    /// e.g. `"gpt-4o"`, `"claude"`, `"fallback"`, `"external"`).
    pub policy_type: String,
    /// Grid column.
    pub x: i32,
    /// Grid row.
    pub y: i32,
    /// Satiety: 100 is full, 0 is starving.
    pub hunger: f64,
    /// Stamina: 100 is rested, 0 is collapsed.
    pub energy: f64,
    /// Health: 0 is dead.
    pub health: f64,
    /// Money. Never negative.
    pub balance: Decimal,
    /// Lifecycle state.
    pub state: AgentLifeState,
    /// Display color (hex string, for downstream renderers).
    pub color: String,
    /// Free-text personality injected into the policy prompt.
    pub personality: Option<String>,
    /// Position in the spawn order; first key of the deterministic
    /// per-tick agent ordering.
    pub spawn_index: u32,
    /// Ticks left asleep. Zero unless `state` is `Sleeping`.
    pub sleep_ticks_remaining: u32,
    /// When the agent died, if it has.
    pub died_at: Option<DateTime<Utc>>,
    /// Why the agent died, if it has.
    pub death_cause: Option<DeathCause>,
    /// Carried items. Entries are removed at quantity zero.
    pub inventory: BTreeMap<ItemType, u64>,
    /// What this agent knows about other agents, by subject.
    pub knowledge: BTreeMap<AgentId, KnowledgeRecord>,
    /// Bounded trail of recent experiences, oldest first.
    pub memories: Vec<MemoryEntry>,
    /// When the agent entered the world.
    pub created_at: DateTime<Utc>,
}

impl Agent {
    /// Whether the agent is alive (any state but `Dead`).
    pub fn is_alive(&self) -> bool {
        self.state != AgentLifeState::Dead
    }

    /// Manhattan distance to another agent.
    pub const fn manhattan_distance_to(&self, other: &Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Quantity of an item currently carried (zero when absent).
    pub fn item_count(&self, item: ItemType) -> u64 {
        self.inventory.get(&item).copied().unwrap_or(0)
    }
}

/// How an agent came to know about another agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryType {
    /// First-hand observation.
    Direct,
    /// Heard from another agent via `share_info`.
    Referral,
}

/// One agent's record of another.
///
/// Cyclic references are avoided by storing ids only; the subject is
/// resolved through the store on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    /// Opinion of the subject, `-100..=100`.
    pub sentiment: i32,
    /// Whether the knowledge is first-hand or a referral.
    pub discovery_type: DiscoveryType,
    /// Who passed the information along, for referrals.
    pub referred_by: Option<AgentId>,
    /// Hops from the original direct observation. Zero means direct.
    pub referral_depth: u32,
    /// Tick of the most recent update.
    pub tick: u64,
}

impl KnowledgeRecord {
    /// A first-hand record with neutral sentiment.
    pub const fn direct(tick: u64) -> Self {
        Self {
            sentiment: 0,
            discovery_type: DiscoveryType::Direct,
            referred_by: None,
            referral_depth: 0,
            tick,
        }
    }
}

/// Kind of a memory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    /// Something the agent did.
    Action,
    /// A social exchange (trade, share_info, deceive).
    Social,
    /// Violence, theft, or being targeted by either.
    Conflict,
}

/// One remembered experience, pinned to the cell where it happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryEntry {
    /// When it happened.
    pub tick: u64,
    /// What category of experience.
    pub kind: MemoryKind,
    /// Cell column.
    pub x: i32,
    /// Cell row.
    pub y: i32,
    /// Short human-readable description.
    pub detail: String,
}

/// A renewable resource node on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpawn {
    /// Unique identifier.
    pub id: SpawnId,
    /// Grid column.
    pub x: i32,
    /// Grid row.
    pub y: i32,
    /// What the spawn produces.
    pub kind: ResourceKind,
    /// Units currently available. `0..=max_amount`.
    pub current_amount: u64,
    /// Capacity ceiling.
    pub max_amount: u64,
    /// Units regenerated per tick by the environment pass, clamped to
    /// `max_amount`.
    pub regen_rate: u64,
    /// Terrain tag.
    pub biome: Biome,
}

/// A shelter cell: sleeping bonus, work site, and purchase point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelter {
    /// Unique identifier.
    pub id: ShelterId,
    /// Grid column.
    pub x: i32,
    /// Grid row.
    pub y: i32,
    /// Whether agents may sleep here.
    pub can_sleep: bool,
    /// Owner, once claimed. Immutable except through the `claim` action.
    pub owner_agent: Option<AgentId>,
}

/// Singleton world state record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldState {
    /// Advanced exactly once per tick commit.
    pub current_tick: u64,
    /// Whether the tick loop is suspended.
    pub is_paused: bool,
    /// The largest committed event version. Always equals the event log's
    /// high-water mark.
    pub global_event_version: u64,
}

impl WorldState {
    /// Fresh world state at tick zero.
    pub const fn initial() -> Self {
        Self {
            current_tick: 0,
            is_paused: false,
            global_event_version: 0,
        }
    }
}

/// An immutable, versioned record of something that happened.
///
/// `version` is globally monotonic and gap-free, including across restarts
/// (the counter is re-seeded from the durable maximum on startup).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldEvent {
    /// Global, strictly increasing sequence number.
    pub version: u64,
    /// Tick the event belongs to.
    pub tick: u64,
    /// What happened.
    pub event_type: EventType,
    /// Primary agent involved, if any.
    pub agent_id: Option<AgentId>,
    /// Type-specific payload.
    pub payload: serde_json::Value,
    /// Wall-clock timestamp at append.
    pub created_at: DateTime<Utc>,
}

/// A full world snapshot: the projection served to dashboards and the
/// payload captured when a variant completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Tick the snapshot was taken at.
    pub tick: u64,
    /// All agents, dead included.
    pub agents: Vec<Agent>,
    /// All resource spawns.
    pub resource_spawns: Vec<ResourceSpawn>,
    /// All shelters.
    pub shelters: Vec<Shelter>,
    /// Names agents have given to cells, keyed by `"x,y"`.
    pub named_locations: BTreeMap<String, String>,
}

/// Registration record for an agent driven over HTTP.
///
/// The raw API key is returned exactly once at registration; only its
/// SHA-256 digest is persisted here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalAgentRecord {
    /// Unique identifier of the registration.
    pub id: ExternalAgentId,
    /// The simulation agent this registration controls.
    pub agent_id: AgentId,
    /// Registered display name.
    pub name: String,
    /// Hex-encoded SHA-256 of the API key.
    pub api_key_hash: String,
    /// Optional callback endpoint supplied at registration.
    pub endpoint: Option<String>,
    /// Optional contact address.
    pub owner_email: Option<String>,
    /// Decide calls allowed per tick.
    pub rate_limit_per_tick: u32,
    /// Last authenticated request.
    pub last_seen_at: Option<DateTime<Utc>>,
    /// Tick of the most recent accepted decide call (rate-limit state).
    pub last_decide_tick: Option<u64>,
    /// False once deregistered.
    pub is_active: bool,
    /// When the registration was created.
    pub created_at: DateTime<Utc>,
}

/// Spec for one agent to spawn, supplied by a variant or by genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Display name.
    pub name: String,
    /// Adapter registry key.
    pub policy_type: String,
    /// Starting column; random when absent.
    pub x: Option<i32>,
    /// Starting row; random when absent.
    pub y: Option<i32>,
    /// Display color; assigned from a palette when absent.
    pub color: Option<String>,
    /// Free-text personality for the prompt.
    pub personality: Option<String>,
}

/// Per-variant overrides applied on top of the base configuration.
///
/// Absent fields leave the base value untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigOverrides {
    /// Minimum wall-time between tick starts.
    #[serde(default)]
    pub tick_interval_ms: Option<u64>,
    /// Hunger lost per tick in the environment pass.
    #[serde(default)]
    pub hunger_decay_per_tick: Option<f64>,
    /// Energy lost per tick in the environment pass.
    #[serde(default)]
    pub energy_decay_per_tick: Option<f64>,
    /// Hard deadline for the decision phase, per agent.
    #[serde(default)]
    pub decision_deadline_ms: Option<u64>,
    /// Whether capability normalization (latency floor, token cap) is on.
    #[serde(default)]
    pub normalization_enabled: Option<bool>,
}

/// One configured run of an experiment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    /// Unique identifier.
    pub id: VariantId,
    /// Display name.
    pub name: String,
    /// Lifecycle state. Variants run sequentially.
    pub status: VariantStatus,
    /// Configuration overrides for this run.
    pub config_overrides: ConfigOverrides,
    /// Agents to spawn.
    pub agent_configs: Vec<AgentConfig>,
    /// Seed for the world RNG.
    pub world_seed: u64,
    /// Hard run length in ticks.
    pub duration_ticks: u64,
    /// Tick at which the variant started.
    pub start_tick: Option<u64>,
    /// Tick at which the variant ended.
    pub end_tick: Option<u64>,
}

/// A sequenced set of variants compared against each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    /// Unique identifier.
    pub id: ExperimentId,
    /// Display name.
    pub name: String,
    /// Lifecycle state.
    pub status: ExperimentStatus,
    /// Variants, in run order.
    pub variants: Vec<Variant>,
    /// When the experiment was created.
    pub created_at: DateTime<Utc>,
}

impl Experiment {
    /// The next variant waiting to run, if any.
    pub fn next_pending(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.status == VariantStatus::Pending)
    }

    /// The currently running variant, if any.
    pub fn running_variant(&self) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.status == VariantStatus::Running)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_agent(x: i32, y: i32) -> Agent {
        Agent {
            id: AgentId::new(),
            name: String::from("Test"),
            policy_type: String::from("fallback"),
            x,
            y,
            hunger: 100.0,
            energy: 100.0,
            health: 100.0,
            balance: Decimal::ZERO,
            state: AgentLifeState::Idle,
            color: String::from("#888888"),
            personality: None,
            spawn_index: 0,
            sleep_ticks_remaining: 0,
            died_at: None,
            death_cause: None,
            inventory: BTreeMap::new(),
            knowledge: BTreeMap::new(),
            memories: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn manhattan_distance() {
        let a = make_agent(3, 4);
        let b = make_agent(1, 1);
        assert_eq!(a.manhattan_distance_to(&b), 5);
        assert_eq!(b.manhattan_distance_to(&a), 5);
        assert_eq!(a.manhattan_distance_to(&a), 0);
    }

    #[test]
    fn dead_agents_are_not_alive() {
        let mut a = make_agent(0, 0);
        assert!(a.is_alive());
        a.state = AgentLifeState::Dead;
        assert!(!a.is_alive());
    }

    #[test]
    fn item_count_defaults_to_zero() {
        let mut a = make_agent(0, 0);
        assert_eq!(a.item_count(ItemType::Food), 0);
        a.inventory.insert(ItemType::Food, 3);
        assert_eq!(a.item_count(ItemType::Food), 3);
    }

    #[test]
    fn direct_knowledge_has_zero_depth() {
        let k = KnowledgeRecord::direct(7);
        assert_eq!(k.referral_depth, 0);
        assert_eq!(k.discovery_type, DiscoveryType::Direct);
        assert!(k.referred_by.is_none());
    }

    #[test]
    fn experiment_finds_pending_variant() {
        let pending = Variant {
            id: VariantId::new(),
            name: String::from("B"),
            status: VariantStatus::Pending,
            config_overrides: ConfigOverrides::default(),
            agent_configs: Vec::new(),
            world_seed: 1,
            duration_ticks: 10,
            start_tick: None,
            end_tick: None,
        };
        let done = Variant {
            status: VariantStatus::Completed,
            name: String::from("A"),
            ..pending.clone()
        };
        let exp = Experiment {
            id: ExperimentId::new(),
            name: String::from("test"),
            status: ExperimentStatus::Planning,
            variants: vec![done, pending.clone()],
            created_at: Utc::now(),
        };
        assert_eq!(exp.next_pending().map(|v| v.id), Some(pending.id));
        assert!(exp.running_variant().is_none());
    }

    #[test]
    fn world_event_roundtrips_serde() {
        let ev = WorldEvent {
            version: 42,
            tick: 7,
            event_type: EventType::AgentGathered,
            agent_id: Some(AgentId::new()),
            payload: serde_json::json!({"amountGathered": 2}),
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&ev).unwrap();
        let back: WorldEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(ev, back);
    }
}
