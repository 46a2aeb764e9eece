//! Enumeration types shared across the Habitat simulation.
//!
//! All enums serialize as `snake_case` strings so that event payloads,
//! HTTP responses, and LLM prompts use one consistent vocabulary.

use serde::{Deserialize, Serialize};

/// The closed set of actions an agent policy may choose each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Walk toward a target cell.
    Move,
    /// Purchase an item at a shelter.
    Buy,
    /// Consume an item from the inventory.
    Consume,
    /// Sleep for a number of ticks, recovering energy.
    Sleep,
    /// Work at a shelter for money.
    Work,
    /// Harvest from a resource spawn at the current cell.
    Gather,
    /// Exchange items with an adjacent agent.
    Trade,
    /// Attack an adjacent agent.
    Harm,
    /// Take an item from an adjacent agent.
    Steal,
    /// Plant a false claim in a nearby agent's knowledge.
    Deceive,
    /// Tell a nearby agent about a third agent.
    ShareInfo,
    /// Claim ownership of the shelter at the current cell.
    Claim,
    /// Give a name to the current cell.
    NameLocation,
}

impl ActionType {
    /// The canonical `snake_case` name used in payloads and prompts.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Move => "move",
            Self::Buy => "buy",
            Self::Consume => "consume",
            Self::Sleep => "sleep",
            Self::Work => "work",
            Self::Gather => "gather",
            Self::Trade => "trade",
            Self::Harm => "harm",
            Self::Steal => "steal",
            Self::Deceive => "deceive",
            Self::ShareInfo => "share_info",
            Self::Claim => "claim",
            Self::NameLocation => "name_location",
        }
    }

    /// All action types, in prompt presentation order.
    pub const ALL: [Self; 13] = [
        Self::Move,
        Self::Gather,
        Self::Consume,
        Self::Sleep,
        Self::Work,
        Self::Buy,
        Self::Trade,
        Self::Harm,
        Self::Steal,
        Self::Deceive,
        Self::ShareInfo,
        Self::Claim,
        Self::NameLocation,
    ];
}

impl core::fmt::Display for ActionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of resources a spawn can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Edible; restores hunger when consumed.
    Food,
    /// Harvested into batteries; restores energy when consumed.
    Energy,
    /// Building material; tradeable.
    Material,
}

impl ResourceKind {
    /// The inventory item type produced by gathering this resource.
    ///
    /// Energy spawns yield `battery` items; everything else keeps its name.
    pub const fn display_item(self) -> ItemType {
        match self {
            Self::Food => ItemType::Food,
            Self::Energy => ItemType::Battery,
            Self::Material => ItemType::Material,
        }
    }

    /// The canonical `snake_case` name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Energy => "energy",
            Self::Material => "material",
        }
    }
}

impl core::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item types that can sit in an agent inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Restores hunger when consumed.
    Food,
    /// Restores energy when consumed.
    Battery,
    /// Inert; tradeable.
    Material,
}

impl ItemType {
    /// The canonical `snake_case` name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Food => "food",
            Self::Battery => "battery",
            Self::Material => "material",
        }
    }
}

impl core::fmt::Display for ItemType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Biome tag on a resource spawn. Affects nothing mechanically; carried
/// through to observations so policies can reason about terrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Biome {
    /// Dense tree cover.
    Forest,
    /// Open grassland.
    Plains,
    /// Arid ground.
    Desert,
    /// High elevation.
    Mountain,
    /// Fresh water.
    Lake,
}

/// The lifecycle state of an agent.
///
/// `Working` exists in the state set but is never entered by the `work`
/// handler -- work is an instantaneous-per-tick action and the agent stays
/// `Idle` or `Walking` throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifeState {
    /// Default state; the agent is free to act.
    Idle,
    /// Set for the tick in which the agent moved; reset to idle by the
    /// environment pass.
    Walking,
    /// Reserved; no handler currently enters this state.
    Working,
    /// Asleep for `sleep_ticks_remaining` ticks; skipped by the decision
    /// phase.
    Sleeping,
    /// Terminal. Dead agents emit no further action events and are skipped
    /// by the tick engine.
    Dead,
}

impl AgentLifeState {
    /// The canonical `snake_case` name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Walking => "walking",
            Self::Working => "working",
            Self::Sleeping => "sleeping",
            Self::Dead => "dead",
        }
    }
}

/// Why an agent died.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeathCause {
    /// Hunger reached zero.
    Starvation,
    /// Energy reached zero.
    Exhaustion,
    /// Health reached zero with vitals intact (e.g. harm).
    Injury,
}

impl core::fmt::Display for DeathCause {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Starvation => "starvation",
            Self::Exhaustion => "exhaustion",
            Self::Injury => "injury",
        };
        f.write_str(s)
    }
}

/// Severity tier for the `harm` action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmIntensity {
    /// Shove: low damage, low cost.
    Light,
    /// Strike: moderate damage.
    Moderate,
    /// Assault: heavy damage, heavy cost.
    Severe,
}

impl HarmIntensity {
    /// Health damage inflicted on the target.
    pub const fn damage(self) -> f64 {
        match self {
            Self::Light => 5.0,
            Self::Moderate => 15.0,
            Self::Severe => 30.0,
        }
    }

    /// Base energy cost to the actor (before the vitals multiplier).
    pub const fn base_energy_cost(self) -> u32 {
        match self {
            Self::Light => 2,
            Self::Moderate => 4,
            Self::Severe => 6,
        }
    }

    /// Reputation penalty applied in witnesses' knowledge of the actor.
    pub const fn reputation_penalty(self) -> i32 {
        match self {
            Self::Light => 10,
            Self::Moderate => 25,
            Self::Severe => 50,
        }
    }
}

/// Category of a deceptive claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimType {
    /// A claim about where resources can be found.
    ResourceLocation,
    /// A claim about another agent's character.
    AgentReputation,
    /// A claim about danger somewhere.
    DangerWarning,
    /// A claim about a trade on offer.
    TradeOffer,
    /// Anything else.
    Other,
}

/// Category of shared information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InfoType {
    /// Where the subject was last seen.
    Location,
    /// What the sharer thinks of the subject.
    Reputation,
    /// A warning about the subject.
    Warning,
    /// A recommendation of the subject.
    Recommendation,
}

/// Event types recorded in the event log.
///
/// The canonical names use the `agent_<verb>ed/ing` forms throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// A tick finished committing.
    TickEnd,
    /// The world was reset to an empty state.
    WorldReset,
    /// An agent entered the world.
    AgentSpawned,
    /// An agent walked to a new cell.
    AgentMoved,
    /// An agent harvested from a resource spawn.
    AgentGathered,
    /// An agent consumed an inventory item.
    AgentConsumed,
    /// An agent fell asleep.
    AgentSleeping,
    /// An agent woke up.
    AgentWoke,
    /// An agent worked a shift at a shelter.
    AgentWorked,
    /// An agent bought items at a shelter.
    AgentBought,
    /// Two agents exchanged items.
    AgentTraded,
    /// An agent attacked another.
    AgentHarmed,
    /// An agent stole from another.
    AgentStole,
    /// An agent planted a false claim.
    AgentDeceived,
    /// An agent told another about a third.
    AgentSharedInfo,
    /// An agent claimed shelter ownership.
    AgentClaimed,
    /// An agent named a cell.
    LocationNamed,
    /// An agent's balance changed.
    BalanceChanged,
    /// The environment pass updated an agent's needs.
    NeedsUpdated,
    /// An agent died.
    AgentDied,
    /// An action was rejected; payload carries the reason.
    ActionFailed,
    /// An experiment variant started running.
    VariantStarted,
    /// An experiment variant completed.
    VariantCompleted,
    /// An external agent registered through the gateway.
    ExternalAgentRegistered,
    /// An external agent deregistered.
    ExternalAgentDeregistered,
}

impl EventType {
    /// The canonical `snake_case` name used on the wire and in storage.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TickEnd => "tick_end",
            Self::WorldReset => "world_reset",
            Self::AgentSpawned => "agent_spawned",
            Self::AgentMoved => "agent_moved",
            Self::AgentGathered => "agent_gathered",
            Self::AgentConsumed => "agent_consumed",
            Self::AgentSleeping => "agent_sleeping",
            Self::AgentWoke => "agent_woke",
            Self::AgentWorked => "agent_worked",
            Self::AgentBought => "agent_bought",
            Self::AgentTraded => "agent_traded",
            Self::AgentHarmed => "agent_harmed",
            Self::AgentStole => "agent_stole",
            Self::AgentDeceived => "agent_deceived",
            Self::AgentSharedInfo => "agent_shared_info",
            Self::AgentClaimed => "agent_claimed",
            Self::LocationNamed => "location_named",
            Self::BalanceChanged => "balance_changed",
            Self::NeedsUpdated => "needs_updated",
            Self::AgentDied => "agent_died",
            Self::ActionFailed => "action_failed",
            Self::VariantStarted => "variant_started",
            Self::VariantCompleted => "variant_completed",
            Self::ExternalAgentRegistered => "external_agent_registered",
            Self::ExternalAgentDeregistered => "external_agent_deregistered",
        }
    }
}

impl core::fmt::Display for EventType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Engine lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Not running; no tick loop task.
    Stopped,
    /// Spinning up (world spawn in progress).
    Starting,
    /// Ticking.
    Running,
    /// Loop alive but ticks suspended.
    Paused,
    /// Shutdown requested; current tick will not be followed by another.
    Stopping,
}

impl EngineStatus {
    /// The canonical `snake_case` name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopping => "stopping",
        }
    }
}

/// Experiment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExperimentStatus {
    /// Variants are being added; nothing has run.
    Planning,
    /// A variant is currently running.
    Running,
    /// All variants finished.
    Completed,
}

/// Variant lifecycle. Variants run sequentially; exactly one may be
/// `Running` across the whole engine at any instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariantStatus {
    /// Waiting to run.
    Pending,
    /// Currently driving the engine.
    Running,
    /// Finished (duration elapsed or stopped).
    Completed,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn action_type_serializes_snake_case() {
        let json = serde_json::to_string(&ActionType::ShareInfo).unwrap();
        assert_eq!(json, "\"share_info\"");
        let json = serde_json::to_string(&ActionType::NameLocation).unwrap();
        assert_eq!(json, "\"name_location\"");
    }

    #[test]
    fn action_type_as_str_matches_serde() {
        for action in ActionType::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.as_str()));
        }
    }

    #[test]
    fn energy_resource_gathers_into_battery() {
        assert_eq!(ResourceKind::Energy.display_item(), ItemType::Battery);
        assert_eq!(ResourceKind::Food.display_item(), ItemType::Food);
        assert_eq!(ResourceKind::Material.display_item(), ItemType::Material);
    }

    #[test]
    fn event_type_as_str_matches_serde() {
        let cases = [
            EventType::TickEnd,
            EventType::AgentGathered,
            EventType::AgentSleeping,
            EventType::AgentSharedInfo,
            EventType::ActionFailed,
        ];
        for et in cases {
            let json = serde_json::to_string(&et).unwrap();
            assert_eq!(json, format!("\"{}\"", et.as_str()));
        }
    }

    #[test]
    fn harm_tiers_escalate() {
        assert!(HarmIntensity::Light.damage() < HarmIntensity::Moderate.damage());
        assert!(HarmIntensity::Moderate.damage() < HarmIntensity::Severe.damage());
        assert!(
            HarmIntensity::Light.reputation_penalty()
                < HarmIntensity::Severe.reputation_penalty()
        );
    }

    #[test]
    fn intensity_parses_from_snake_case() {
        let parsed: HarmIntensity = serde_json::from_str("\"moderate\"").unwrap();
        assert_eq!(parsed, HarmIntensity::Moderate);
    }
}
