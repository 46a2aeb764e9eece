//! Error types for the world store.

use habitat_types::{AgentId, ExternalAgentId, ShelterId, SpawnId};

/// Errors that can occur in the world store.
///
/// `Storage` covers transient driver failures; the tick engine retries an
/// agent's commit once on those before dropping the agent's tick.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    /// No agent with the given id.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// No resource spawn with the given id.
    #[error("resource spawn not found: {0}")]
    SpawnNotFound(SpawnId),

    /// No shelter with the given id.
    #[error("shelter not found: {0}")]
    ShelterNotFound(ShelterId),

    /// No external agent registration with the given id.
    #[error("external agent not found: {0}")]
    ExternalAgentNotFound(ExternalAgentId),

    /// The world state singleton has not been initialized yet.
    #[error("world state not initialized")]
    NotInitialized,

    /// An underlying storage failure (transient; retried once).
    #[error("storage error: {0}")]
    Storage(String),
}
