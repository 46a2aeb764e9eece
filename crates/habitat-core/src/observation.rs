//! The observation builder.
//!
//! A pure function of a world snapshot: identical inputs produce
//! identical observations. Visibility is a configurable radius around the
//! agent's cell (Chebyshev by default, Euclidean optional); dead agents
//! are filtered; recent events are limited to those the agent could have
//! seen -- they happened within the radius, or involved the agent
//! directly.

use habitat_types::{
    Agent, AgentId, NearbyAgent, NearbyShelter, NearbySpawn, Observation, ResourceSpawn, SelfView,
    Shelter, VisibleEvent, WorldEvent, WorldSize,
};
use serde::{Deserialize, Serialize};

/// How the visibility radius is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RadiusMetric {
    /// `max(|dx|, |dy|)` -- a square window.
    Chebyshev,
    /// `sqrt(dx^2 + dy^2)` -- a circular window.
    Euclidean,
}

/// Observation construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationConfig {
    /// Visibility radius in cells.
    #[serde(default = "default_radius")]
    pub radius: u32,
    /// Distance metric for the radius.
    #[serde(default = "default_metric")]
    pub metric: RadiusMetric,
    /// How many trailing ticks of events are candidates for visibility.
    #[serde(default = "default_event_window")]
    pub event_window_ticks: u64,
    /// Cap on visible events per observation.
    #[serde(default = "default_max_events")]
    pub max_recent_events: usize,
}

const fn default_radius() -> u32 {
    8
}

const fn default_metric() -> RadiusMetric {
    RadiusMetric::Chebyshev
}

const fn default_event_window() -> u64 {
    5
}

const fn default_max_events() -> usize {
    20
}

impl Default for ObservationConfig {
    fn default() -> Self {
        Self {
            radius: default_radius(),
            metric: default_metric(),
            event_window_ticks: default_event_window(),
            max_recent_events: default_max_events(),
        }
    }
}

/// A read-only snapshot of the world for one tick's observations.
#[derive(Debug, Clone, Copy)]
pub struct WorldView<'a> {
    /// All agents (the builder filters dead ones itself).
    pub agents: &'a [Agent],
    /// All resource spawns.
    pub spawns: &'a [ResourceSpawn],
    /// All shelters.
    pub shelters: &'a [Shelter],
    /// Recent events, newest first.
    pub recent_events: &'a [WorldEvent],
    /// Grid dimensions.
    pub world_size: WorldSize,
}

/// Whether `(x, y)` lies within the radius of `(cx, cy)`.
fn within_radius(config: &ObservationConfig, cx: i32, cy: i32, x: i32, y: i32) -> bool {
    let dx = cx.abs_diff(x);
    let dy = cy.abs_diff(y);
    match config.metric {
        RadiusMetric::Chebyshev => dx.max(dy) <= config.radius,
        RadiusMetric::Euclidean => {
            let dx = u64::from(dx);
            let dy = u64::from(dy);
            dx * dx + dy * dy <= u64::from(config.radius) * u64::from(config.radius)
        }
    }
}

/// Build the observation for one agent at one tick.
pub fn build_observation(
    agent: &Agent,
    view: &WorldView<'_>,
    tick: u64,
    config: &ObservationConfig,
) -> Observation {
    let mut nearby_agents: Vec<NearbyAgent> = view
        .agents
        .iter()
        .filter(|other| {
            other.id != agent.id
                && other.is_alive()
                && within_radius(config, agent.x, agent.y, other.x, other.y)
        })
        .map(|other| NearbyAgent {
            id: other.id,
            name: other.name.clone(),
            x: other.x,
            y: other.y,
            state: other.state,
            distance: agent.manhattan_distance_to(other),
        })
        .collect();
    nearby_agents.sort_by_key(|a| (a.distance, a.id));

    let mut nearby_resource_spawns: Vec<NearbySpawn> = view
        .spawns
        .iter()
        .filter(|spawn| within_radius(config, agent.x, agent.y, spawn.x, spawn.y))
        .map(|spawn| NearbySpawn {
            id: spawn.id,
            x: spawn.x,
            y: spawn.y,
            kind: spawn.kind,
            current_amount: spawn.current_amount,
            biome: spawn.biome,
        })
        .collect();
    nearby_resource_spawns
        .sort_by_key(|s| (agent.x.abs_diff(s.x) + agent.y.abs_diff(s.y), s.id));

    let mut nearby_shelters: Vec<NearbyShelter> = view
        .shelters
        .iter()
        .filter(|shelter| within_radius(config, agent.x, agent.y, shelter.x, shelter.y))
        .map(|shelter| NearbyShelter {
            id: shelter.id,
            x: shelter.x,
            y: shelter.y,
            can_sleep: shelter.can_sleep,
            owner_agent: shelter.owner_agent,
        })
        .collect();
    nearby_shelters.sort_by_key(|s| (agent.x.abs_diff(s.x) + agent.y.abs_diff(s.y), s.id));

    let min_tick = tick.saturating_sub(config.event_window_ticks);
    let recent_events: Vec<VisibleEvent> = view
        .recent_events
        .iter()
        .filter(|event| event.tick >= min_tick)
        .filter(|event| event_visible_to(agent, event, config))
        .take(config.max_recent_events)
        .map(|event| VisibleEvent {
            tick: event.tick,
            event_type: event.event_type,
            agent_id: event.agent_id,
            summary: summarize_event(event, view.agents),
        })
        .collect();

    Observation {
        self_view: SelfView {
            id: agent.id,
            name: agent.name.clone(),
            x: agent.x,
            y: agent.y,
            hunger: agent.hunger,
            energy: agent.energy,
            health: agent.health,
            balance: agent.balance,
            state: agent.state,
            policy_type: agent.policy_type.clone(),
            personality: agent.personality.clone(),
        },
        inventory: agent.inventory.clone(),
        nearby_agents,
        nearby_resource_spawns,
        nearby_shelters,
        recent_events,
        tick,
        world_size: view.world_size,
    }
}

/// Whether an event is visible to an agent: it involves them directly
/// (as actor or named target) or carries a position within the radius.
fn event_visible_to(agent: &Agent, event: &WorldEvent, config: &ObservationConfig) -> bool {
    if event.agent_id == Some(agent.id) {
        return true;
    }
    if let Some(target) = event.payload.get("targetAgentId").and_then(|v| v.as_str())
        && target == agent.id.to_string()
    {
        return true;
    }
    let x = event.payload.get("x").and_then(serde_json::Value::as_i64);
    let y = event.payload.get("y").and_then(serde_json::Value::as_i64);
    if let (Some(x), Some(y)) = (x, y) {
        let x = i32::try_from(x).unwrap_or(i32::MAX);
        let y = i32::try_from(y).unwrap_or(i32::MAX);
        return within_radius(config, agent.x, agent.y, x, y);
    }
    false
}

/// Render a short human-readable line for the prompt.
fn summarize_event(event: &WorldEvent, agents: &[Agent]) -> String {
    let actor = event
        .agent_id
        .and_then(|id| name_of(agents, id))
        .unwrap_or_else(|| String::from("someone"));
    match event.event_type {
        habitat_types::EventType::AgentGathered => {
            let amount = event
                .payload
                .get("amountGathered")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0);
            format!("{actor} gathered {amount} resources")
        }
        habitat_types::EventType::AgentHarmed => format!("{actor} attacked another agent"),
        habitat_types::EventType::AgentStole => format!("{actor} stole from another agent"),
        habitat_types::EventType::AgentTraded => format!("{actor} completed a trade"),
        habitat_types::EventType::AgentDied => {
            let cause = event
                .payload
                .get("cause")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown causes");
            format!("{actor} died of {cause}")
        }
        habitat_types::EventType::LocationNamed => {
            let name = event
                .payload
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("something");
            format!("{actor} named this area {name}")
        }
        other => format!("{actor}: {}", other.as_str()),
    }
}

/// Look up an agent's display name.
fn name_of(agents: &[Agent], id: AgentId) -> Option<String> {
    agents.iter().find(|a| a.id == id).map(|a| a.name.clone())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use habitat_types::{AgentLifeState, Biome, EventType, ResourceKind, ShelterId, SpawnId};
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::*;

    fn make_agent(name: &str, x: i32, y: i32) -> Agent {
        Agent {
            id: AgentId::new(),
            name: name.to_owned(),
            policy_type: String::from("fallback"),
            x,
            y,
            hunger: 80.0,
            energy: 80.0,
            health: 100.0,
            balance: Decimal::ZERO,
            state: AgentLifeState::Idle,
            color: String::from("#000"),
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

    fn make_spawn(x: i32, y: i32) -> ResourceSpawn {
        ResourceSpawn {
            id: SpawnId::new(),
            x,
            y,
            kind: ResourceKind::Food,
            current_amount: 5,
            max_amount: 10,
            regen_rate: 1,
            biome: Biome::Plains,
        }
    }

    #[test]
    fn visibility_is_limited_by_radius() {
        let me = make_agent("Me", 50, 50);
        let near = make_agent("Near", 53, 53);
        let far = make_agent("Far", 70, 70);
        let agents = vec![me.clone(), near.clone(), far];
        let spawns = vec![make_spawn(51, 50), make_spawn(90, 90)];
        let view = WorldView {
            agents: &agents,
            spawns: &spawns,
            shelters: &[],
            recent_events: &[],
            world_size: WorldSize::default(),
        };
        let obs = build_observation(&me, &view, 1, &ObservationConfig::default());

        assert_eq!(obs.nearby_agents.len(), 1);
        assert_eq!(obs.nearby_agents[0].name, "Near");
        assert_eq!(obs.nearby_resource_spawns.len(), 1);
    }

    #[test]
    fn dead_agents_are_filtered() {
        let me = make_agent("Me", 10, 10);
        let mut ghost = make_agent("Ghost", 11, 10);
        ghost.state = AgentLifeState::Dead;
        let agents = vec![me.clone(), ghost];
        let view = WorldView {
            agents: &agents,
            spawns: &[],
            shelters: &[],
            recent_events: &[],
            world_size: WorldSize::default(),
        };
        let obs = build_observation(&me, &view, 1, &ObservationConfig::default());
        assert!(obs.nearby_agents.is_empty());
    }

    #[test]
    fn events_visible_when_nearby_or_involving() {
        let me = make_agent("Me", 10, 10);
        let other = make_agent("Other", 11, 10);
        let nearby_event = WorldEvent {
            version: 1,
            tick: 1,
            event_type: EventType::AgentGathered,
            agent_id: Some(other.id),
            payload: json!({"x": 12, "y": 10, "amountGathered": 2}),
            created_at: Utc::now(),
        };
        let distant_event = WorldEvent {
            version: 2,
            tick: 1,
            event_type: EventType::AgentGathered,
            agent_id: Some(other.id),
            payload: json!({"x": 90, "y": 90, "amountGathered": 1}),
            created_at: Utc::now(),
        };
        let about_me = WorldEvent {
            version: 3,
            tick: 1,
            event_type: EventType::AgentHarmed,
            agent_id: Some(other.id),
            payload: json!({"targetAgentId": me.id.to_string()}),
            created_at: Utc::now(),
        };
        let agents = vec![me.clone(), other];
        let events = vec![about_me, distant_event, nearby_event];
        let view = WorldView {
            agents: &agents,
            spawns: &[],
            shelters: &[],
            recent_events: &events,
            world_size: WorldSize::default(),
        };
        let obs = build_observation(&me, &view, 2, &ObservationConfig::default());
        assert_eq!(obs.recent_events.len(), 2, "distant event filtered");
    }

    #[test]
    fn old_events_age_out_of_the_window() {
        let me = make_agent("Me", 10, 10);
        let stale = WorldEvent {
            version: 1,
            tick: 1,
            event_type: EventType::AgentGathered,
            agent_id: Some(me.id),
            payload: json!({}),
            created_at: Utc::now(),
        };
        let agents = vec![me.clone()];
        let events = vec![stale];
        let view = WorldView {
            agents: &agents,
            spawns: &[],
            shelters: &[],
            recent_events: &events,
            world_size: WorldSize::default(),
        };
        let obs = build_observation(&me, &view, 20, &ObservationConfig::default());
        assert!(obs.recent_events.is_empty());
    }

    #[test]
    fn identical_inputs_identical_observations() {
        let me = make_agent("Me", 10, 10);
        let agents = vec![me.clone(), make_agent("Other", 12, 12)];
        let spawns = vec![make_spawn(11, 11)];
        let shelters = vec![Shelter {
            id: ShelterId::new(),
            x: 10,
            y: 10,
            can_sleep: true,
            owner_agent: None,
        }];
        let view = WorldView {
            agents: &agents,
            spawns: &spawns,
            shelters: &shelters,
            recent_events: &[],
            world_size: WorldSize::default(),
        };
        let config = ObservationConfig::default();
        let a = build_observation(&me, &view, 3, &config);
        let b = build_observation(&me, &view, 3, &config);
        assert_eq!(a, b);
    }

    #[test]
    fn euclidean_metric_narrows_corners() {
        let me = make_agent("Me", 50, 50);
        let corner = make_agent("Corner", 57, 57);
        let agents = vec![me.clone(), corner];
        let chebyshev = ObservationConfig::default();
        let euclidean = ObservationConfig {
            metric: RadiusMetric::Euclidean,
            ..ObservationConfig::default()
        };
        let view = WorldView {
            agents: &agents,
            spawns: &[],
            shelters: &[],
            recent_events: &[],
            world_size: WorldSize::default(),
        };
        // (7,7) is inside the Chebyshev square (max 7 <= 8) but outside
        // the Euclidean circle (sqrt(98) > 8).
        let seen = build_observation(&me, &view, 1, &chebyshev);
        assert_eq!(seen.nearby_agents.len(), 1);
        let unseen = build_observation(&me, &view, 1, &euclidean);
        assert!(unseen.nearby_agents.is_empty());
    }
}
