//! The deterministic fallback policy.
//!
//! A pure function of the observation and a seeded RNG stream -- no I/O,
//! no clocks. It runs whenever the LLM path fails, times out, or is
//! disabled (TEST_MODE), and its decisions are never cached so a policy
//! gets a fresh attempt at recovery next tick.
//!
//! The priority ladder, top first:
//!
//! 1. hungry with food in hand -> consume
//! 2. very hungry, funded, at a shelter -> buy food
//! 3. hungry on a stocked food spawn -> gather
//! 4. hungry with food in view -> step toward the nearest food spawn
//! 5. tired -> sleep(3)
//! 6. broke but able -> work(2)
//! 7. able -> wander one random 4-neighbor step
//! 8. otherwise -> sleep(1)

use habitat_types::{ActionParams, AgentDecision, ItemType, Observation, ResourceKind};
use rand::Rng;
use rust_decimal::Decimal;

/// Produce the fallback decision for an observation.
///
/// `rng` must be a deterministic per-agent-per-tick stream so identical
/// runs produce identical wanders.
pub fn fallback_decision<R: Rng>(observation: &Observation, rng: &mut R) -> AgentDecision {
    let me = &observation.self_view;
    let has_food = observation
        .inventory
        .get(&ItemType::Food)
        .copied()
        .unwrap_or(0)
        > 0;

    // 1. Eat what we carry.
    if me.hunger < 50.0 && has_food {
        return decide(ActionParams::Consume {
            item_type: ItemType::Food,
        });
    }

    // 2. Buy food at a shelter.
    if me.hunger < 30.0 && me.balance >= Decimal::from(10) && observation.at_shelter() {
        return decide(ActionParams::Buy {
            item_type: ItemType::Food,
            quantity: 1,
        });
    }

    // 3. Gather from a stocked food spawn underfoot.
    if me.hunger < 50.0 && observation.spawn_at_self(ResourceKind::Food).is_some_and(|s| s.current_amount > 0) {
        return decide(ActionParams::Gather {
            resource_type: Some(ResourceKind::Food),
            quantity: 1,
        });
    }

    // 4. Walk toward visible food.
    if me.hunger < 40.0
        && let Some(spawn) = observation.nearest_available_spawn(ResourceKind::Food)
    {
        let (to_x, to_y) = step_toward(me.x, me.y, spawn.x, spawn.y);
        if (to_x, to_y) != (me.x, me.y) {
            return decide(ActionParams::Move { to_x, to_y });
        }
    }

    // 5. Rest when tired.
    if me.energy < 30.0 {
        return decide(ActionParams::Sleep { duration: 3 });
    }

    // 6. Earn when broke.
    if me.balance < Decimal::from(50) && me.energy >= 20.0 {
        return decide(ActionParams::Work { duration: 2 });
    }

    // 7. Wander.
    if me.energy >= 10.0 {
        let neighbors = in_bounds_neighbors(observation);
        if !neighbors.is_empty() {
            let index = rng.random_range(0..neighbors.len());
            // index is always in range by construction.
            if let Some(&(to_x, to_y)) = neighbors.get(index) {
                return decide(ActionParams::Move { to_x, to_y });
            }
        }
    }

    // 8. Nap.
    decide(ActionParams::Sleep { duration: 1 })
}

/// Wrap params with the fallback's fixed reasoning tag.
fn decide(params: ActionParams) -> AgentDecision {
    AgentDecision {
        params,
        reasoning: Some(String::from("fallback policy")),
    }
}

/// One Manhattan step from `(x, y)` toward `(tx, ty)`, columns first.
const fn step_toward(x: i32, y: i32, tx: i32, ty: i32) -> (i32, i32) {
    if tx > x {
        (x + 1, y)
    } else if tx < x {
        (x - 1, y)
    } else if ty > y {
        (x, y + 1)
    } else if ty < y {
        (x, y - 1)
    } else {
        (x, y)
    }
}

/// The observer's in-bounds 4-neighbors, in N/S/E/W order.
fn in_bounds_neighbors(observation: &Observation) -> Vec<(i32, i32)> {
    let me = &observation.self_view;
    [
        (me.x, me.y - 1),
        (me.x, me.y + 1),
        (me.x + 1, me.y),
        (me.x - 1, me.y),
    ]
    .into_iter()
    .filter(|&(x, y)| observation.world_size.contains(x, y))
    .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::collections::BTreeMap;

    use habitat_types::{
        AgentId, AgentLifeState, Biome, NearbyShelter, NearbySpawn, Observation, SelfView,
        ShelterId, SpawnId, WorldSize,
    };
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use super::*;

    fn make_observation() -> Observation {
        Observation {
            self_view: SelfView {
                id: AgentId::new(),
                name: String::from("A"),
                x: 10,
                y: 10,
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
            nearby_resource_spawns: Vec::new(),
            nearby_shelters: Vec::new(),
            recent_events: Vec::new(),
            tick: 1,
            world_size: WorldSize::default(),
        }
    }

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(42)
    }

    #[test]
    fn hungry_with_food_eats() {
        let mut obs = make_observation();
        obs.self_view.hunger = 45.0;
        obs.inventory.insert(ItemType::Food, 1);
        let decision = fallback_decision(&obs, &mut rng());
        assert_eq!(
            decision.params,
            ActionParams::Consume {
                item_type: ItemType::Food
            }
        );
    }

    #[test]
    fn very_hungry_funded_at_shelter_buys() {
        let mut obs = make_observation();
        obs.self_view.hunger = 25.0;
        obs.self_view.balance = Decimal::from(10);
        obs.nearby_shelters.push(NearbyShelter {
            id: ShelterId::new(),
            x: 10,
            y: 10,
            can_sleep: true,
            owner_agent: None,
        });
        let decision = fallback_decision(&obs, &mut rng());
        assert_eq!(
            decision.params,
            ActionParams::Buy {
                item_type: ItemType::Food,
                quantity: 1
            }
        );
    }

    #[test]
    fn hungry_on_stocked_spawn_gathers() {
        let mut obs = make_observation();
        obs.self_view.hunger = 45.0;
        obs.nearby_resource_spawns.push(NearbySpawn {
            id: SpawnId::new(),
            x: 10,
            y: 10,
            kind: ResourceKind::Food,
            current_amount: 3,
            biome: Biome::Plains,
        });
        let decision = fallback_decision(&obs, &mut rng());
        assert_eq!(
            decision.params,
            ActionParams::Gather {
                resource_type: Some(ResourceKind::Food),
                quantity: 1
            }
        );
    }

    #[test]
    fn hungry_with_distant_food_steps_toward_it() {
        let mut obs = make_observation();
        obs.self_view.hunger = 35.0;
        obs.nearby_resource_spawns.push(NearbySpawn {
            id: SpawnId::new(),
            x: 13,
            y: 10,
            kind: ResourceKind::Food,
            current_amount: 3,
            biome: Biome::Plains,
        });
        let decision = fallback_decision(&obs, &mut rng());
        assert_eq!(decision.params, ActionParams::Move { to_x: 11, to_y: 10 });
    }

    #[test]
    fn tired_sleeps_three() {
        let mut obs = make_observation();
        obs.self_view.energy = 25.0;
        let decision = fallback_decision(&obs, &mut rng());
        assert_eq!(decision.params, ActionParams::Sleep { duration: 3 });
    }

    #[test]
    fn broke_and_able_works_two() {
        let mut obs = make_observation();
        obs.self_view.balance = Decimal::from(20);
        let decision = fallback_decision(&obs, &mut rng());
        assert_eq!(decision.params, ActionParams::Work { duration: 2 });
    }

    #[test]
    fn comfortable_agent_wanders_one_step() {
        let mut obs = make_observation();
        obs.self_view.balance = Decimal::from(100);
        let decision = fallback_decision(&obs, &mut rng());
        match decision.params {
            ActionParams::Move { to_x, to_y } => {
                let distance = (to_x - 10).abs() + (to_y - 10).abs();
                assert_eq!(distance, 1, "wander is exactly one step");
            }
            other => panic!("expected a move, got {other:?}"),
        }
    }

    #[test]
    fn exhausted_agent_naps() {
        let mut obs = make_observation();
        obs.self_view.energy = 5.0;
        obs.self_view.balance = Decimal::from(100);
        let decision = fallback_decision(&obs, &mut rng());
        assert_eq!(decision.params, ActionParams::Sleep { duration: 1 });
    }

    #[test]
    fn same_seed_same_wander() {
        let mut obs = make_observation();
        obs.self_view.balance = Decimal::from(100);
        let first = fallback_decision(&obs, &mut rng());
        let second = fallback_decision(&obs, &mut rng());
        assert_eq!(first, second, "pure function of (observation, seed)");
    }

    #[test]
    fn wander_respects_bounds() {
        let mut obs = make_observation();
        obs.self_view.balance = Decimal::from(100);
        obs.self_view.x = 0;
        obs.self_view.y = 0;
        for seed in 0..32 {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let decision = fallback_decision(&obs, &mut rng);
            if let ActionParams::Move { to_x, to_y } = decision.params {
                assert!(obs.world_size.contains(to_x, to_y));
            }
        }
    }
}
