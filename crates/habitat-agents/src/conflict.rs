//! Shared machinery for conflict actions (harm, steal, deceive).
//!
//! Conflict actions target another agent and are observed: every alive
//! agent within the witness radius (excluding actor and target) receives a
//! reputation hit against the actor in its knowledge map. Range gates are
//! Manhattan -- harm and steal demand adjacency, deception carries to 3.

use habitat_types::{
    Agent, AgentId, DiscoveryType, KnowledgeProvenance, KnowledgeUpdate,
};

/// Maximum Manhattan distance for harm and steal.
pub const CONTACT_RANGE: u32 = 1;

/// Maximum Manhattan distance for deceive.
pub const DECEIVE_RANGE: u32 = 3;

/// Validate the target of a conflict or social action.
///
/// Rejects self-targeting, dead targets, and targets beyond `max_range`
/// (Manhattan). Returns the rejection reason on failure.
pub fn check_target(
    actor: &Agent,
    target: Option<&Agent>,
    max_range: u32,
) -> Result<(), String> {
    let Some(target) = target else {
        return Err(String::from("Target not found"));
    };
    if target.id == actor.id {
        return Err(String::from("Cannot target yourself"));
    }
    if !target.is_alive() {
        return Err(String::from("Target is dead"));
    }
    if actor.manhattan_distance_to(target) > max_range {
        return Err(String::from("Target too far away"));
    }
    Ok(())
}

/// Build the reputation updates witnesses apply against the actor.
///
/// Each witness records first-hand (depth 0) knowledge of the actor with
/// the given sentiment penalty.
pub fn witness_reputation_updates(
    actor: AgentId,
    witnesses: &[AgentId],
    penalty: i32,
    tick: u64,
) -> Vec<KnowledgeUpdate> {
    witnesses
        .iter()
        .map(|&witness| KnowledgeUpdate {
            owner: witness,
            subject: actor,
            sentiment_delta: -penalty.abs(),
            provenance: Some(KnowledgeProvenance {
                discovery_type: DiscoveryType::Direct,
                referred_by: None,
                referral_depth: 0,
            }),
            tick,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use habitat_types::AgentLifeState;
    use rust_decimal::Decimal;

    use super::*;

    fn agent_at(x: i32, y: i32) -> Agent {
        Agent {
            id: AgentId::new(),
            name: String::from("A"),
            policy_type: String::from("fallback"),
            x,
            y,
            hunger: 100.0,
            energy: 100.0,
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

    #[test]
    fn contact_range_is_manhattan_one() {
        let actor = agent_at(5, 5);
        let adjacent = agent_at(5, 6);
        let diagonal = agent_at(6, 6);

        assert!(check_target(&actor, Some(&adjacent), CONTACT_RANGE).is_ok());
        // Diagonal is Manhattan distance 2: out of reach.
        assert_eq!(
            check_target(&actor, Some(&diagonal), CONTACT_RANGE),
            Err(String::from("Target too far away"))
        );
    }

    #[test]
    fn self_target_rejected() {
        let actor = agent_at(0, 0);
        let err = check_target(&actor, Some(&actor.clone()), DECEIVE_RANGE).unwrap_err();
        assert_eq!(err, "Cannot target yourself");
    }

    #[test]
    fn dead_target_rejected() {
        let actor = agent_at(0, 0);
        let mut target = agent_at(0, 1);
        target.state = AgentLifeState::Dead;
        let err = check_target(&actor, Some(&target), CONTACT_RANGE).unwrap_err();
        assert_eq!(err, "Target is dead");
    }

    #[test]
    fn missing_target_rejected() {
        let actor = agent_at(0, 0);
        let err = check_target(&actor, None, CONTACT_RANGE).unwrap_err();
        assert_eq!(err, "Target not found");
    }

    #[test]
    fn witness_updates_are_negative_and_direct() {
        let actor = AgentId::new();
        let witnesses = vec![AgentId::new(), AgentId::new()];
        let updates = witness_reputation_updates(actor, &witnesses, 25, 9);

        assert_eq!(updates.len(), 2);
        for update in &updates {
            assert_eq!(update.subject, actor);
            assert_eq!(update.sentiment_delta, -25);
            assert_eq!(update.tick, 9);
            let provenance = update.provenance.as_ref().unwrap();
            assert_eq!(provenance.referral_depth, 0);
        }
    }
}
