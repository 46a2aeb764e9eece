//! The observation payload delivered to an agent's policy each tick.
//!
//! Observations are built by a pure function of the world snapshot: the
//! same agent, world, and tick always produce the same observation. Only
//! entities within the visibility radius appear, dead agents are filtered,
//! and recent events are limited to those the agent could have seen.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::enums::{AgentLifeState, Biome, EventType, ItemType, ResourceKind};
use crate::ids::{AgentId, ShelterId, SpawnId};

/// Grid dimensions, carried in every observation so policies know the
/// bounds of valid movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSize {
    /// Number of columns.
    pub width: u32,
    /// Number of rows.
    pub height: u32,
}

impl WorldSize {
    /// Whether a cell lies inside the grid.
    pub const fn contains(self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && (x as u32) < self.width && (y as u32) < self.height
    }
}

impl Default for WorldSize {
    /// The standard 100x100 grid.
    fn default() -> Self {
        Self {
            width: 100,
            height: 100,
        }
    }
}

/// The observing agent's view of itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelfView {
    /// The agent's id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Satiety, 0-100.
    pub hunger: f64,
    /// Stamina, 0-100.
    pub energy: f64,
    /// Health, 0-100.
    pub health: f64,
    /// Money.
    pub balance: Decimal,
    /// Lifecycle state.
    pub state: AgentLifeState,
    /// Adapter registry key driving this agent.
    pub policy_type: String,
    /// Free-text personality, if configured.
    pub personality: Option<String>,
}

/// Another agent within the visibility radius. Dead agents never appear.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyAgent {
    /// The agent's id.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Lifecycle state.
    pub state: AgentLifeState,
    /// Manhattan distance from the observer.
    pub distance: u32,
}

/// A resource spawn within the visibility radius.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbySpawn {
    /// The spawn's id.
    pub id: SpawnId,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// What it produces.
    pub kind: ResourceKind,
    /// Units currently available.
    pub current_amount: u64,
    /// Terrain tag.
    pub biome: Biome,
}

/// A shelter within the visibility radius.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NearbyShelter {
    /// The shelter's id.
    pub id: ShelterId,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
    /// Whether agents may sleep here.
    pub can_sleep: bool,
    /// Owner, once claimed.
    pub owner_agent: Option<AgentId>,
}

/// An event the observer could have seen: it happened within the
/// visibility radius or involved the observer directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisibleEvent {
    /// Tick of the event.
    pub tick: u64,
    /// What happened.
    pub event_type: EventType,
    /// Primary agent involved, if any.
    pub agent_id: Option<AgentId>,
    /// Short human-readable description rendered into the prompt.
    pub summary: String,
}

/// The complete per-tick observation for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// The observer's own state.
    #[serde(rename = "self")]
    pub self_view: SelfView,
    /// Carried items.
    pub inventory: BTreeMap<ItemType, u64>,
    /// Alive agents in view, nearest first.
    pub nearby_agents: Vec<NearbyAgent>,
    /// Resource spawns in view, nearest first.
    pub nearby_resource_spawns: Vec<NearbySpawn>,
    /// Shelters in view, nearest first.
    pub nearby_shelters: Vec<NearbyShelter>,
    /// Visible recent events, newest first.
    pub recent_events: Vec<VisibleEvent>,
    /// The tick this observation was built for.
    pub tick: u64,
    /// Grid dimensions.
    pub world_size: WorldSize,
}

impl Observation {
    /// The nearest spawn of a given kind with units available, if any.
    pub fn nearest_available_spawn(&self, kind: ResourceKind) -> Option<&NearbySpawn> {
        self.nearby_resource_spawns
            .iter()
            .filter(|s| s.kind == kind && s.current_amount > 0)
            .min_by_key(|s| {
                s.x.abs_diff(self.self_view.x) + s.y.abs_diff(self.self_view.y)
            })
    }

    /// A spawn of the given kind at the observer's own cell, if any.
    pub fn spawn_at_self(&self, kind: ResourceKind) -> Option<&NearbySpawn> {
        self.nearby_resource_spawns
            .iter()
            .find(|s| s.kind == kind && s.x == self.self_view.x && s.y == self.self_view.y)
    }

    /// Whether the observer stands on a shelter cell.
    pub fn at_shelter(&self) -> bool {
        self.nearby_shelters
            .iter()
            .any(|s| s.x == self.self_view.x && s.y == self.self_view.y)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_observation() -> Observation {
        Observation {
            self_view: SelfView {
                id: AgentId::new(),
                name: String::from("Scout"),
                x: 5,
                y: 5,
                hunger: 80.0,
                energy: 80.0,
                health: 100.0,
                balance: Decimal::ZERO,
                state: AgentLifeState::Idle,
                policy_type: String::from("fallback"),
                personality: None,
            },
            inventory: BTreeMap::new(),
            nearby_agents: Vec::new(),
            nearby_resource_spawns: vec![
                NearbySpawn {
                    id: SpawnId::new(),
                    x: 8,
                    y: 5,
                    kind: ResourceKind::Food,
                    current_amount: 4,
                    biome: Biome::Plains,
                },
                NearbySpawn {
                    id: SpawnId::new(),
                    x: 5,
                    y: 6,
                    kind: ResourceKind::Food,
                    current_amount: 0,
                    biome: Biome::Forest,
                },
                NearbySpawn {
                    id: SpawnId::new(),
                    x: 5,
                    y: 5,
                    kind: ResourceKind::Energy,
                    current_amount: 7,
                    biome: Biome::Mountain,
                },
            ],
            nearby_shelters: Vec::new(),
            recent_events: Vec::new(),
            tick: 1,
            world_size: WorldSize {
                width: 100,
                height: 100,
            },
        }
    }

    #[test]
    fn world_size_bounds() {
        let size = WorldSize {
            width: 10,
            height: 10,
        };
        assert!(size.contains(0, 0));
        assert!(size.contains(9, 9));
        assert!(!size.contains(10, 9));
        assert!(!size.contains(-1, 0));
    }

    #[test]
    fn nearest_spawn_skips_depleted() {
        let obs = make_observation();
        // The depleted spawn at (5,6) is closer but has nothing left.
        let nearest = obs.nearest_available_spawn(ResourceKind::Food).unwrap();
        assert_eq!((nearest.x, nearest.y), (8, 5));
    }

    #[test]
    fn spawn_at_self_matches_kind() {
        let obs = make_observation();
        assert!(obs.spawn_at_self(ResourceKind::Energy).is_some());
        assert!(obs.spawn_at_self(ResourceKind::Food).is_none());
    }

    #[test]
    fn at_shelter_false_when_none_nearby() {
        let obs = make_observation();
        assert!(!obs.at_shelter());
    }

    #[test]
    fn self_serializes_as_self_key() {
        let obs = make_observation();
        let json = serde_json::to_value(&obs).unwrap();
        assert!(json.get("self").is_some());
        assert_eq!(json["self"]["name"], "Scout");
    }
}
