//! Shared type definitions for the Habitat simulation.
//!
//! This crate is the single source of truth for all types used across the
//! Habitat workspace: entity records, action intents, decisions, events,
//! and the observation payload delivered to agent policies each tick.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for all entity identifiers
//! - [`enums`] -- Enumeration types (actions, events, resources, lifecycle)
//! - [`structs`] -- Core entity structs (agents, spawns, shelters, experiments)
//! - [`actions`] -- Action intents, results, and proposed world changes
//! - [`observation`] -- Observation payload built for agents each tick

pub mod actions;
pub mod enums;
pub mod ids;
pub mod observation;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use actions::{
    ActionChanges, ActionIntent, ActionParams, ActionResult, AgentDecision, AgentPatch,
    EventDraft, HarvestRequest, IntentSource, KnowledgeProvenance, KnowledgeUpdate,
};
pub use enums::{
    ActionType, AgentLifeState, Biome, ClaimType, DeathCause, EngineStatus, EventType,
    ExperimentStatus, HarmIntensity, InfoType, ItemType, ResourceKind, VariantStatus,
};
pub use ids::{
    AgentId, EventId, ExperimentId, ExternalAgentId, ShelterId, SpawnId, VariantId,
};
pub use observation::{
    NearbyAgent, NearbyShelter, NearbySpawn, Observation, SelfView, VisibleEvent, WorldSize,
};
pub use structs::{
    Agent, AgentConfig, ConfigOverrides, DiscoveryType, Experiment, ExternalAgentRecord,
    KnowledgeRecord, MemoryEntry, MemoryKind, ResourceSpawn, Shelter, Variant, WorldEvent,
    WorldSnapshot, WorldState, MEMORY_LIMIT, VITAL_MAX,
};
