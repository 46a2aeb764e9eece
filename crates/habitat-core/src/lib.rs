//! The simulation core: deterministic tick engine and its satellites.
//!
//! - [`rng`] -- the seeded world RNG and its derived per-agent streams
//! - [`observation`] -- the pure observation builder
//! - [`config`] -- typed YAML configuration with environment overrides
//! - [`spawner`] -- world population from agent configs
//! - [`engine`] -- the tick loop (decision fanout, serial application,
//!   environment pass, commit)
//! - [`experiment`] -- variant sequencing, seeded reset, snapshotting

pub mod config;
pub mod engine;
pub mod error;
pub mod experiment;
pub mod observation;
pub mod rng;
pub mod spawner;

pub use config::SimulationConfig;
pub use engine::{
    external_intent, EngineDeps, ExperimentContext, TickEngine, TickSummary, VariantCompletion,
    EXTERNAL_POLICY,
};
pub use error::EngineError;
pub use experiment::{ExperimentController, VariantSpec};
pub use observation::{build_observation, ObservationConfig, RadiusMetric, WorldView};
pub use rng::{RngDomain, WorldRng};
pub use spawner::{spawn_world, SpawnSettings};
