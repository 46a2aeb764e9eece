//! Energy costs, the progressive vitals penalty, and economy constants.
//!
//! Every action has a base energy cost. The effective cost charged is
//! `ceil(base × multiplier)` where the multiplier grows as the actor's
//! vitals degrade: weakened agents pay more for everything. Affordability
//! is always checked against the effective cost before any effect applies.

use habitat_types::{Agent, HarmIntensity};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tunable action-economy values, shared by all handlers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionConfig {
    /// Price per item unit when buying at a shelter.
    pub buy_price: Decimal,
    /// Money earned per unit of work duration.
    pub work_pay: Decimal,
    /// Hunger restored by consuming one food item.
    pub food_hunger_restore: f64,
    /// Energy restored by consuming one battery item.
    pub battery_energy_restore: f64,
    /// Maximum Manhattan distance a single move may cover.
    pub move_range: u32,
    /// Chebyshev radius within which bystanders witness conflict actions.
    pub witness_radius: u32,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            buy_price: Decimal::from(10),
            work_pay: Decimal::from(10),
            food_hunger_restore: 30.0,
            battery_energy_restore: 25.0,
            move_range: 5,
            witness_radius: 5,
        }
    }
}

/// The progressive vitals penalty multiplier.
///
/// Baseline 1.0; `energy < 30` adds 0.5; `energy < 15` adds another 0.5;
/// `hunger < 30` adds 0.3.
pub fn vitals_multiplier(agent: &Agent) -> f64 {
    let mut multiplier = 1.0;
    if agent.energy < 30.0 {
        multiplier += 0.5;
    }
    if agent.energy < 15.0 {
        multiplier += 0.5;
    }
    if agent.hunger < 30.0 {
        multiplier += 0.3;
    }
    multiplier
}

/// Effective energy cost: `ceil(base × multiplier)`.
pub fn effective_cost(base: u32, multiplier: f64) -> u32 {
    let scaled = f64::from(base) * multiplier;
    // ceil of a non-negative product of bounded inputs fits u32.
    scaled.ceil() as u32
}

/// Base energy cost of a sleep action (sleeping is free; it recovers).
pub const SLEEP_BASE_COST: u32 = 0;

/// Base energy cost of consuming an item.
pub const CONSUME_BASE_COST: u32 = 0;

/// Base energy cost of buying.
pub const BUY_BASE_COST: u32 = 0;

/// Base energy cost per unit of work duration.
pub const WORK_COST_PER_DURATION: u32 = 2;

/// Hunger burned per unit of work duration.
pub const WORK_HUNGER_PER_DURATION: f64 = 0.5;

/// Base energy cost of a trade.
pub const TRADE_BASE_COST: u32 = 1;

/// Base energy cost of stealing.
pub const STEAL_BASE_COST: u32 = 2;

/// Base energy cost of deceiving.
pub const DECEIVE_BASE_COST: u32 = 1;

/// Base energy cost of sharing information.
pub const SHARE_INFO_BASE_COST: u32 = 1;

/// Base energy cost of claiming a shelter.
pub const CLAIM_BASE_COST: u32 = 1;

/// Base energy cost of naming a location.
pub const NAME_LOCATION_BASE_COST: u32 = 0;

/// Reputation penalty witnesses apply for observed theft.
pub const STEAL_REPUTATION_PENALTY: i32 = 20;

/// Reputation penalty witnesses apply for observed deception.
pub const DECEIVE_REPUTATION_PENALTY: i32 = 15;

/// Sentiment gained between counterparties on a completed trade.
pub const TRADE_SENTIMENT_GAIN: i32 = 5;

/// Base energy cost of a harm action by intensity.
pub const fn harm_base_cost(intensity: HarmIntensity) -> u32 {
    intensity.base_energy_cost()
}
