//! Prompt rendering via `minijinja`.
//!
//! The builder ships with embedded default templates so the engine runs
//! with no templates directory; operators can override with a directory
//! of `system.j2` and `user.j2` to tune behavior without recompiling.

use habitat_types::Observation;
use minijinja::Environment;

use crate::error::AdapterError;

/// The embedded system template: establishes the agent's reality and the
/// strict JSON output contract.
///
/// The observation's `self` view is exposed to templates as `agent`
/// (`self` is reserved by the template engine).
const DEFAULT_SYSTEM_TEMPLATE: &str = "\
You are {{ agent.name }}, an autonomous inhabitant of a {{ world_size.width }}x{{ world_size.height }} grid world.
{% if agent.personality %}Your personality: {{ agent.personality }}{% endif %}
You survive by keeping hunger, energy, and health above zero. You may move, gather, consume, sleep, work, buy, trade, and interact with other inhabitants.

Respond with a single JSON object and nothing else:
{\"action\": \"<action name>\", \"params\": { ... }, \"reasoning\": \"<one short sentence>\"}

Valid actions: move, gather, consume, sleep, work, buy, trade, harm, steal, deceive, share_info, claim, name_location.";

/// The embedded user template: the rendered observation.
const DEFAULT_USER_TEMPLATE: &str = "\
## Tick {{ tick }}

## You
Position: ({{ agent.x }}, {{ agent.y }})
Hunger: {{ agent.hunger }} / 100
Energy: {{ agent.energy }} / 100
Health: {{ agent.health }} / 100
Balance: {{ agent.balance }}
State: {{ agent.state }}

## Inventory
{% if inventory %}{% for item, count in inventory|items %}- {{ item }}: {{ count }}
{% endfor %}{% else %}(empty)
{% endif %}
## Nearby agents
{% for a in nearby_agents %}- {{ a.name }} at ({{ a.x }}, {{ a.y }}), distance {{ a.distance }}
{% else %}(none)
{% endfor %}
## Nearby resources
{% for s in nearby_resource_spawns %}- {{ s.kind }} at ({{ s.x }}, {{ s.y }}): {{ s.current_amount }} left
{% else %}(none)
{% endfor %}
## Nearby shelters
{% for s in nearby_shelters %}- shelter at ({{ s.x }}, {{ s.y }})
{% else %}(none)
{% endfor %}
## Recent events
{% for e in recent_events %}- [tick {{ e.tick }}] {{ e.summary }}
{% else %}(quiet)
{% endfor %}
Choose your next action.";

/// The complete rendered prompt ready for a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message establishing the agent's reality.
    pub system: String,
    /// User message carrying the observation.
    pub user: String,
}

/// Renders observations into prompts.
pub struct PromptBuilder {
    env: Environment<'static>,
}

impl PromptBuilder {
    /// A builder using the embedded default templates.
    pub fn new() -> Result<Self, AdapterError> {
        let mut env = Environment::new();
        env.add_template("system", DEFAULT_SYSTEM_TEMPLATE)
            .map_err(|e| AdapterError::Template(format!("embedded system template: {e}")))?;
        env.add_template("user", DEFAULT_USER_TEMPLATE)
            .map_err(|e| AdapterError::Template(format!("embedded user template: {e}")))?;
        Ok(Self { env })
    }

    /// A builder loading `system.j2` and `user.j2` from a directory.
    pub fn from_dir(dir: &str) -> Result<Self, AdapterError> {
        let mut env = Environment::new();
        let system = load_template(dir, "system.j2")?;
        let user = load_template(dir, "user.j2")?;
        env.add_template_owned("system", system)
            .map_err(|e| AdapterError::Template(format!("failed to add system template: {e}")))?;
        env.add_template_owned("user", user)
            .map_err(|e| AdapterError::Template(format!("failed to add user template: {e}")))?;
        Ok(Self { env })
    }

    /// Render both prompt halves from an observation.
    ///
    /// The wire payload's `self` key is mirrored as `agent` for the
    /// templates, since `self` is reserved by the template engine.
    pub fn render(&self, observation: &Observation) -> Result<RenderedPrompt, AdapterError> {
        let mut value = serde_json::to_value(observation)
            .map_err(|e| AdapterError::Template(format!("observation serialize failed: {e}")))?;
        if let Some(map) = value.as_object_mut()
            && let Some(self_view) = map.get("self").cloned()
        {
            let _ = map.insert(String::from("agent"), self_view);
        }

        let system = self
            .env
            .get_template("system")
            .map_err(|e| AdapterError::Template(format!("missing system template: {e}")))?
            .render(&value)
            .map_err(|e| AdapterError::Template(format!("system render failed: {e}")))?;

        let user = self
            .env
            .get_template("user")
            .map_err(|e| AdapterError::Template(format!("missing user template: {e}")))?
            .render(&value)
            .map_err(|e| AdapterError::Template(format!("user render failed: {e}")))?;

        Ok(RenderedPrompt { system, user })
    }
}

/// Read a template file from disk.
fn load_template(dir: &str, filename: &str) -> Result<String, AdapterError> {
    let path = format!("{dir}/{filename}");
    std::fs::read_to_string(&path)
        .map_err(|e| AdapterError::Template(format!("failed to read {path}: {e}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use habitat_types::{
        AgentId, AgentLifeState, ItemType, NearbySpawn, Observation, ResourceKind, SelfView,
        SpawnId, WorldSize,
    };
    use rust_decimal::Decimal;

    use super::*;

    fn make_observation() -> Observation {
        let mut inventory = BTreeMap::new();
        inventory.insert(ItemType::Food, 2_u64);
        Observation {
            self_view: SelfView {
                id: AgentId::new(),
                name: String::from("Wren"),
                x: 4,
                y: 9,
                hunger: 62.0,
                energy: 55.0,
                health: 100.0,
                balance: Decimal::from(30),
                state: AgentLifeState::Idle,
                policy_type: String::from("claude"),
                personality: Some(String::from("cautious and curious")),
            },
            inventory,
            nearby_agents: Vec::new(),
            nearby_resource_spawns: vec![NearbySpawn {
                id: SpawnId::new(),
                x: 5,
                y: 9,
                kind: ResourceKind::Food,
                current_amount: 7,
                biome: habitat_types::Biome::Forest,
            }],
            nearby_shelters: Vec::new(),
            recent_events: Vec::new(),
            tick: 12,
            world_size: WorldSize::default(),
        }
    }

    #[test]
    fn embedded_templates_render() {
        let builder = PromptBuilder::new().unwrap();
        let prompt = builder.render(&make_observation()).unwrap();

        assert!(prompt.system.contains("Wren"));
        assert!(prompt.system.contains("cautious and curious"));
        assert!(prompt.user.contains("Tick 12"));
        assert!(prompt.user.contains("(4, 9)"));
        assert!(prompt.user.contains("food: 2"));
        assert!(prompt.user.contains("7 left"));
    }

    #[test]
    fn identical_observations_render_identically() {
        let builder = PromptBuilder::new().unwrap();
        let first = builder.render(&make_observation());
        let second = builder.render(&make_observation());
        // Same shape in, same prompt out (the observation differs only by
        // the random agent id, which the templates do not print).
        assert_eq!(
            first.unwrap().user.lines().count(),
            second.unwrap().user.lines().count()
        );
    }

    #[test]
    fn missing_dir_is_a_template_error() {
        let result = PromptBuilder::from_dir("/nonexistent/habitat-templates");
        assert!(matches!(result, Err(AdapterError::Template(_))));
    }
}
