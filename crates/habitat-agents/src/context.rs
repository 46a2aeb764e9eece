//! The read-only context handlers run against.
//!
//! The tick engine snapshots whatever an intent might touch -- spawns and
//! shelters at the actor's cell, the resolved target and subject agents,
//! the witness set -- before invoking the handler. Handlers never reach
//! back into the store.

use habitat_types::{Agent, AgentId, ResourceSpawn, Shelter, WorldSize};

/// Everything a handler may read besides the actor itself.
#[derive(Debug, Clone, Default)]
pub struct HandlerContext {
    /// The tick being executed.
    pub tick: u64,
    /// Grid dimensions (move bounds checking).
    pub world_size: WorldSize,
    /// Resource spawns at the actor's cell.
    pub spawns_here: Vec<ResourceSpawn>,
    /// Shelters at the actor's cell.
    pub shelters_here: Vec<Shelter>,
    /// The resolved target agent, for actions that name one.
    pub target: Option<Agent>,
    /// The resolved subject agent, for `share_info`.
    pub subject: Option<Agent>,
    /// Alive agents within the witness radius, excluding actor and target.
    pub witnesses: Vec<AgentId>,
}
