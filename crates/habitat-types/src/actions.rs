//! Action intents, decisions, and the proposed-change types handlers return.
//!
//! Handlers never mutate the world. They validate an intent against a
//! read-only context and return an [`ActionResult`] whose
//! [`ActionChanges`] and [`EventDraft`]s the tick engine commits atomically
//! per agent. The store remains the only component that writes entities.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{
    ActionType, AgentLifeState, ClaimType, DeathCause, EventType, HarmIntensity, InfoType,
    ItemType, ResourceKind,
};
use crate::ids::{AgentId, ShelterId, SpawnId};
use crate::structs::{Agent, DiscoveryType, MemoryEntry};

/// Default gather quantity when the policy omits one.
fn default_quantity() -> u32 {
    1
}

/// Default work/sleep duration when the policy omits one.
fn default_duration() -> u32 {
    1
}

/// Typed parameters for each action, tagged by action name.
///
/// The wire shape is `{"action": "<name>", "params": {...}}` with camelCase
/// parameter keys, matching what the prompt instructs policies to emit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "params", rename_all = "snake_case")]
pub enum ActionParams {
    /// Walk toward a cell.
    #[serde(rename_all = "camelCase")]
    Move {
        /// Target column.
        to_x: i32,
        /// Target row.
        to_y: i32,
    },
    /// Purchase items at a shelter.
    #[serde(rename_all = "camelCase")]
    Buy {
        /// What to buy.
        item_type: ItemType,
        /// How many. Defaults to 1.
        #[serde(default = "default_quantity")]
        quantity: u32,
    },
    /// Consume one item from the inventory.
    #[serde(rename_all = "camelCase")]
    Consume {
        /// What to consume.
        item_type: ItemType,
    },
    /// Sleep for `duration` ticks.
    #[serde(rename_all = "camelCase")]
    Sleep {
        /// Ticks to sleep, `1..=10`.
        #[serde(default = "default_duration")]
        duration: u32,
    },
    /// Work a shift at a shelter.
    #[serde(rename_all = "camelCase")]
    Work {
        /// Shift length, `1..=5`.
        #[serde(default = "default_duration")]
        duration: u32,
    },
    /// Harvest from a spawn at the current cell.
    #[serde(rename_all = "camelCase")]
    Gather {
        /// Restrict to a specific resource kind, if given.
        #[serde(default)]
        resource_type: Option<ResourceKind>,
        /// Units to gather, `1..=5`. Defaults to 1.
        #[serde(default = "default_quantity")]
        quantity: u32,
    },
    /// Exchange items with an adjacent agent.
    #[serde(rename_all = "camelCase")]
    Trade {
        /// Counterparty.
        target_agent_id: AgentId,
        /// Item given away.
        offer_item: ItemType,
        /// Quantity given away.
        offer_quantity: u32,
        /// Item received.
        request_item: ItemType,
        /// Quantity received.
        request_quantity: u32,
    },
    /// Attack an adjacent agent.
    #[serde(rename_all = "camelCase")]
    Harm {
        /// Victim.
        target_agent_id: AgentId,
        /// Severity tier.
        intensity: HarmIntensity,
    },
    /// Take an item from an adjacent agent.
    #[serde(rename_all = "camelCase")]
    Steal {
        /// Victim.
        target_agent_id: AgentId,
        /// Preferred item; the victim's first inventory entry when absent.
        #[serde(default)]
        item_type: Option<ItemType>,
    },
    /// Plant a false claim in a nearby agent's knowledge.
    #[serde(rename_all = "camelCase")]
    Deceive {
        /// Listener.
        target_agent_id: AgentId,
        /// The false claim, 5..=500 characters.
        claim: String,
        /// Category of the claim.
        claim_type: ClaimType,
    },
    /// Tell a nearby agent about a third agent.
    #[serde(rename_all = "camelCase")]
    ShareInfo {
        /// Listener.
        target_agent_id: AgentId,
        /// Who the information is about.
        subject_agent_id: AgentId,
        /// Category of the information.
        info_type: InfoType,
        /// Opinion conveyed, `-100..=100`.
        #[serde(default)]
        sentiment: Option<i32>,
    },
    /// Claim the shelter at the current cell.
    #[serde(rename_all = "camelCase")]
    Claim {},
    /// Name the current cell.
    #[serde(rename_all = "camelCase")]
    NameLocation {
        /// The new name.
        name: String,
    },
}

impl ActionParams {
    /// The action type this parameter set belongs to.
    pub const fn action_type(&self) -> ActionType {
        match self {
            Self::Move { .. } => ActionType::Move,
            Self::Buy { .. } => ActionType::Buy,
            Self::Consume { .. } => ActionType::Consume,
            Self::Sleep { .. } => ActionType::Sleep,
            Self::Work { .. } => ActionType::Work,
            Self::Gather { .. } => ActionType::Gather,
            Self::Trade { .. } => ActionType::Trade,
            Self::Harm { .. } => ActionType::Harm,
            Self::Steal { .. } => ActionType::Steal,
            Self::Deceive { .. } => ActionType::Deceive,
            Self::ShareInfo { .. } => ActionType::ShareInfo,
            Self::Claim {} => ActionType::Claim,
            Self::NameLocation { .. } => ActionType::NameLocation,
        }
    }
}

/// A validated decision produced by a policy (or the fallback).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDecision {
    /// The chosen action with its parameters.
    #[serde(flatten)]
    pub params: ActionParams,
    /// The policy's stated reasoning. Logged, never interpreted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
}

impl AgentDecision {
    /// Decision without reasoning.
    pub const fn new(params: ActionParams) -> Self {
        Self {
            params,
            reasoning: None,
        }
    }

    /// The action type of this decision.
    pub const fn action_type(&self) -> ActionType {
        self.params.action_type()
    }
}

/// Where an intent came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSource {
    /// The agent's configured policy adapter.
    Policy,
    /// The deterministic fallback (adapter error, timeout, or TEST_MODE).
    Fallback,
    /// Submitted over HTTP through the external agent gateway.
    External,
}

/// A decision bound to an agent and tick, ready for the application phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionIntent {
    /// The acting agent.
    pub agent_id: AgentId,
    /// The tick this intent belongs to.
    pub tick: u64,
    /// The decision itself.
    pub decision: AgentDecision,
    /// Provenance of the decision.
    pub source: IntentSource,
    /// When the decision was produced.
    pub submitted_at: DateTime<Utc>,
}

/// A partial agent update. Absent fields are untouched.
///
/// Within a tick, patches are last-writer-wins per field; the tick engine
/// serializes all writes per agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentPatch {
    /// New column.
    pub x: Option<i32>,
    /// New row.
    pub y: Option<i32>,
    /// New hunger value.
    pub hunger: Option<f64>,
    /// New energy value.
    pub energy: Option<f64>,
    /// New health value.
    pub health: Option<f64>,
    /// New balance.
    pub balance: Option<Decimal>,
    /// New lifecycle state.
    pub state: Option<AgentLifeState>,
    /// New sleep countdown.
    pub sleep_ticks_remaining: Option<u32>,
    /// Death timestamp.
    pub died_at: Option<DateTime<Utc>>,
    /// Death cause.
    pub death_cause: Option<DeathCause>,
}

impl AgentPatch {
    /// Apply this patch to an agent, clamping vitals into `0..=100`.
    pub fn apply(&self, agent: &mut Agent) {
        if let Some(x) = self.x {
            agent.x = x;
        }
        if let Some(y) = self.y {
            agent.y = y;
        }
        if let Some(hunger) = self.hunger {
            agent.hunger = hunger.clamp(0.0, crate::structs::VITAL_MAX);
        }
        if let Some(energy) = self.energy {
            agent.energy = energy.clamp(0.0, crate::structs::VITAL_MAX);
        }
        if let Some(health) = self.health {
            agent.health = health.clamp(0.0, crate::structs::VITAL_MAX);
        }
        if let Some(balance) = self.balance {
            agent.balance = balance.max(Decimal::ZERO);
        }
        if let Some(state) = self.state {
            agent.state = state;
        }
        if let Some(sleep) = self.sleep_ticks_remaining {
            agent.sleep_ticks_remaining = sleep;
        }
        if let Some(died_at) = self.died_at {
            agent.died_at = Some(died_at);
        }
        if let Some(cause) = self.death_cause {
            agent.death_cause = Some(cause);
        }
    }

    /// Whether the patch changes nothing.
    pub const fn is_empty(&self) -> bool {
        self.x.is_none()
            && self.y.is_none()
            && self.hunger.is_none()
            && self.energy.is_none()
            && self.health.is_none()
            && self.balance.is_none()
            && self.state.is_none()
            && self.sleep_ticks_remaining.is_none()
            && self.died_at.is_none()
            && self.death_cause.is_none()
    }
}

/// Provenance metadata for a knowledge update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeProvenance {
    /// First-hand or referral.
    pub discovery_type: DiscoveryType,
    /// Who passed it along, for referrals.
    pub referred_by: Option<AgentId>,
    /// Hops from the original direct observation.
    pub referral_depth: u32,
}

/// A proposed update to one agent's knowledge of another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeUpdate {
    /// Whose knowledge changes.
    pub owner: AgentId,
    /// Who the knowledge is about.
    pub subject: AgentId,
    /// Added to the existing sentiment, clamped to `-100..=100`.
    pub sentiment_delta: i32,
    /// When present, overwrites the record's provenance.
    pub provenance: Option<KnowledgeProvenance>,
    /// Tick of the update.
    pub tick: u64,
}

/// A gather proposal: the engine performs the atomic harvest and finalizes
/// the action with whatever the spawn actually granted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarvestRequest {
    /// The spawn to harvest.
    pub spawn_id: SpawnId,
    /// Units requested, already validated to `1..=5`.
    pub quantity: u32,
    /// Inventory item the harvest lands as.
    pub item_type: ItemType,
    /// The actor's vitals cost multiplier at validation time.
    pub cost_multiplier: f64,
}

/// The set of world changes a handler proposes.
///
/// Everything here is applied by the tick engine through the world store;
/// handlers themselves stay pure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionChanges {
    /// Partial agent updates (actor, and targets for conflict actions).
    pub agent_patches: Vec<(AgentId, AgentPatch)>,
    /// Inventory adjustments; negative removes.
    pub inventory_deltas: Vec<(AgentId, ItemType, i64)>,
    /// Pending atomic harvest (gather only).
    pub harvest: Option<HarvestRequest>,
    /// Shelter ownership transfer (claim only).
    pub shelter_owner: Option<(ShelterId, AgentId)>,
    /// Cell naming (name_location only).
    pub named_location: Option<(i32, i32, String)>,
    /// Memories to append (bounded by the store).
    pub memories: Vec<(AgentId, MemoryEntry)>,
    /// Knowledge updates (witnesses, referrals, deceptions).
    pub knowledge_updates: Vec<KnowledgeUpdate>,
}

/// An event awaiting version assignment by the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    /// What happened.
    pub event_type: EventType,
    /// Primary agent involved.
    pub agent_id: Option<AgentId>,
    /// Type-specific payload (camelCase keys).
    pub payload: serde_json::Value,
}

impl EventDraft {
    /// Draft an event for an agent.
    pub const fn for_agent(
        event_type: EventType,
        agent_id: AgentId,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            event_type,
            agent_id: Some(agent_id),
            payload,
        }
    }

    /// Draft an event with no primary agent.
    pub const fn world(event_type: EventType, payload: serde_json::Value) -> Self {
        Self {
            event_type,
            agent_id: None,
            payload,
        }
    }
}

/// What a handler returns: success with proposed changes and events, or a
/// failure with a short reason. Failures never mutate state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Whether the action passed validation and preconditions.
    pub success: bool,
    /// Short failure reason (surfaced in `action_failed` events).
    pub error: Option<String>,
    /// Proposed changes. Empty on failure.
    pub changes: ActionChanges,
    /// Events to append on commit. Empty on failure.
    pub events: Vec<EventDraft>,
}

impl ActionResult {
    /// A successful result.
    pub const fn ok(changes: ActionChanges, events: Vec<EventDraft>) -> Self {
        Self {
            success: true,
            error: None,
            changes,
            events,
        }
    }

    /// A failed result with a reason. No changes, no events.
    pub fn fail(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(reason.into()),
            changes: ActionChanges::default(),
            events: Vec::new(),
        }
    }
}
