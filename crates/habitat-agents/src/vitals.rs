//! Vital mechanics applied by the environment pass.
//!
//! Each tick, after the application phase, every alive agent's needs
//! decay. A vital sitting at zero bleeds health every pass, and kills the
//! agent once it has survived one full recovery opportunity: death
//! triggers when the vital was already empty at the start of the tick
//! *and* is still empty after this pass. An agent that zeroes its energy
//! working dies in the next tick's pass -- unless its next action (sleep,
//! food) refilled the vital first. Causes: starvation for hunger,
//! exhaustion for energy, injury when only health has run out.
//!
//! All functions here are pure: they compute outcomes the engine applies
//! through the store.

use habitat_types::{Agent, DeathCause, VITAL_MAX};
use serde::{Deserialize, Serialize};

/// Tunable decay and recovery rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalsConfig {
    /// Hunger lost per tick.
    pub hunger_decay_per_tick: f64,
    /// Energy lost per tick.
    pub energy_decay_per_tick: f64,
    /// Health lost per tick while a vital sits at zero.
    pub zero_vital_bleed: f64,
    /// Energy recovered per tick asleep.
    pub sleep_recovery_per_tick: f64,
}

impl Default for VitalsConfig {
    fn default() -> Self {
        Self {
            hunger_decay_per_tick: 0.5,
            energy_decay_per_tick: 0.3,
            zero_vital_bleed: 5.0,
            sleep_recovery_per_tick: 10.0,
        }
    }
}

/// Result of one environment-pass decay step for an agent.
#[derive(Debug, Clone, PartialEq)]
pub struct DecayOutcome {
    /// Hunger after decay.
    pub hunger: f64,
    /// Energy after decay.
    pub energy: f64,
    /// Health after any bleed.
    pub health: f64,
    /// Cause of death, when the agent died this pass.
    pub death: Option<DeathCause>,
}

/// Apply one tick of needs decay to an agent's vitals.
///
/// `agent` carries the current (post-application) values; `tick_start`
/// the values as the tick began. Order: decay hunger and energy (clamped
/// at zero); bleed health while either sits at zero; then the death
/// check -- a vital kills only when it was empty at tick start and is
/// still empty now, starvation before exhaustion before injury.
pub fn apply_needs_decay(
    agent: &Agent,
    tick_start: &Agent,
    config: &VitalsConfig,
) -> DecayOutcome {
    let hunger = (agent.hunger - config.hunger_decay_per_tick).max(0.0);
    let energy = (agent.energy - config.energy_decay_per_tick).max(0.0);

    let mut health = agent.health;
    if hunger <= 0.0 || energy <= 0.0 {
        health = (health - config.zero_vital_bleed).max(0.0);
    }

    let death = if tick_start.hunger <= 0.0 && hunger <= 0.0 {
        Some(DeathCause::Starvation)
    } else if tick_start.energy <= 0.0 && energy <= 0.0 {
        Some(DeathCause::Exhaustion)
    } else if tick_start.health <= 0.0 && health <= 0.0 {
        Some(DeathCause::Injury)
    } else {
        None
    };

    DecayOutcome {
        hunger,
        energy,
        health,
        death,
    }
}

/// Result of advancing a sleeping agent by one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct SleepOutcome {
    /// Energy after recovery.
    pub energy: f64,
    /// Ticks still to sleep.
    pub remaining: u32,
    /// Whether the agent woke this tick.
    pub woke: bool,
}

/// Advance a sleeping agent: recover energy and count down the timer.
///
/// The agent wakes (back to idle) when the countdown reaches zero.
pub fn advance_sleep(agent: &Agent, config: &VitalsConfig) -> SleepOutcome {
    let energy = (agent.energy + config.sleep_recovery_per_tick).min(VITAL_MAX);
    let remaining = agent.sleep_ticks_remaining.saturating_sub(1);
    SleepOutcome {
        energy,
        remaining,
        woke: remaining == 0,
    }
}
