//! Error types for the simulation core.

use habitat_types::{AgentId, ExperimentId};

/// Errors that can occur in the tick engine and experiment controller.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A world store operation failed.
    #[error("world error: {0}")]
    World(#[from] habitat_world::WorldError),

    /// The engine was asked to start while already running.
    #[error("engine already running")]
    AlreadyRunning,

    /// The engine was asked to do something that needs it running.
    #[error("engine not running")]
    NotRunning,

    /// A per-agent commit failed after its retry.
    #[error("commit failed for agent {agent_id}: {reason}")]
    Commit {
        /// The agent whose commit failed.
        agent_id: AgentId,
        /// The underlying failure.
        reason: String,
    },

    /// A variant is already running somewhere.
    #[error("a variant is already running")]
    VariantAlreadyRunning,

    /// No experiment with the given id.
    #[error("experiment not found: {0}")]
    ExperimentNotFound(ExperimentId),

    /// The experiment has no pending variant to run.
    #[error("no pending variant for experiment {0}")]
    NoPendingVariant(ExperimentId),

    /// Configuration failed to load or parse.
    #[error("config error: {0}")]
    Config(String),
}
