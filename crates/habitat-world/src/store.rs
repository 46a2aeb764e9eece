//! The [`WorldStore`]: async facade over the in-memory world state.
//!
//! A single `tokio::sync::RwLock` guards the interior. Reads take the
//! shared lock and clone out what they need; every mutator takes the
//! exclusive lock, which is what makes [`WorldStore::harvest_resource`]'s
//! compare-decrement atomic: two concurrent harvests of the same spawn
//! serialize on the lock and can never over-grant.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use habitat_types::{
    Agent, AgentId, AgentPatch, ExternalAgentId, ExternalAgentRecord, ItemType, KnowledgeRecord,
    KnowledgeUpdate, MemoryEntry, ResourceSpawn, Shelter, ShelterId, SpawnId, WorldSize,
    WorldSnapshot, WorldState, MEMORY_LIMIT,
};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::WorldError;

/// Default grid dimensions when none are configured.
const DEFAULT_WORLD_SIZE: WorldSize = WorldSize {
    width: 100,
    height: 100,
};

/// Interior state guarded by the store lock.
#[derive(Debug, Default)]
struct WorldInner {
    agents: BTreeMap<AgentId, Agent>,
    spawns: BTreeMap<SpawnId, ResourceSpawn>,
    shelters: BTreeMap<ShelterId, Shelter>,
    named_locations: BTreeMap<(i32, i32), String>,
    external_agents: BTreeMap<ExternalAgentId, ExternalAgentRecord>,
    world_state: Option<WorldState>,
    world_size: Option<WorldSize>,
}

/// Transactional store of all world entities.
///
/// Cheap to clone; clones share the same interior state.
#[derive(Debug, Clone, Default)]
pub struct WorldStore {
    inner: Arc<RwLock<WorldInner>>,
}

impl WorldStore {
    /// Create an empty, uninitialized store.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // World state singleton
    // =========================================================================

    /// Create the world state singleton if missing. Idempotent.
    ///
    /// Also records the grid dimensions; a later call with a different size
    /// leaves the existing size untouched (reset first to change it).
    pub async fn init_world_state(&self, size: WorldSize) -> WorldState {
        let mut inner = self.inner.write().await;
        inner.world_size.get_or_insert(size);
        *inner.world_state.get_or_insert(WorldState::initial())
    }

    /// Read the world state singleton.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotInitialized`] before `init_world_state`.
    pub async fn get_world_state(&self) -> Result<WorldState, WorldError> {
        self.inner
            .read()
            .await
            .world_state
            .ok_or(WorldError::NotInitialized)
    }

    /// The configured grid dimensions.
    pub async fn world_size(&self) -> WorldSize {
        self.inner.read().await.world_size.unwrap_or(DEFAULT_WORLD_SIZE)
    }

    /// Suspend the tick loop flag.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotInitialized`] before `init_world_state`.
    pub async fn pause_world(&self) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let state = inner.world_state.as_mut().ok_or(WorldError::NotInitialized)?;
        state.is_paused = true;
        Ok(())
    }

    /// Clear the tick loop suspension flag.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotInitialized`] before `init_world_state`.
    pub async fn resume_world(&self) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let state = inner.world_state.as_mut().ok_or(WorldError::NotInitialized)?;
        state.is_paused = false;
        Ok(())
    }

    /// Advance the tick counter by one and return the new tick.
    ///
    /// Called exactly once per tick, in the commit phase.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotInitialized`] before `init_world_state`.
    pub async fn advance_tick(&self) -> Result<u64, WorldError> {
        let mut inner = self.inner.write().await;
        let state = inner.world_state.as_mut().ok_or(WorldError::NotInitialized)?;
        state.current_tick = state.current_tick.saturating_add(1);
        Ok(state.current_tick)
    }

    /// Record the largest committed event version on the singleton.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::NotInitialized`] before `init_world_state`.
    pub async fn set_global_event_version(&self, version: u64) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let state = inner.world_state.as_mut().ok_or(WorldError::NotInitialized)?;
        state.global_event_version = version;
        Ok(())
    }

    /// Clear all entities and the world state singleton.
    ///
    /// The store identity (the shared handle) is preserved; callers keep
    /// their clones. `init_world_state` must run again before the engine
    /// accepts ticks.
    pub async fn reset_world_data(&self) {
        let mut inner = self.inner.write().await;
        inner.agents.clear();
        inner.spawns.clear();
        inner.shelters.clear();
        inner.named_locations.clear();
        inner.external_agents.clear();
        inner.world_state = None;
        inner.world_size = None;
        debug!("World data reset");
    }

    // =========================================================================
    // Agents
    // =========================================================================

    /// Insert a new agent.
    pub async fn insert_agent(&self, agent: Agent) {
        let mut inner = self.inner.write().await;
        inner.agents.insert(agent.id, agent);
    }

    /// Read one agent.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] when the id is unknown.
    pub async fn get_agent(&self, id: AgentId) -> Result<Agent, WorldError> {
        self.inner
            .read()
            .await
            .agents
            .get(&id)
            .cloned()
            .ok_or(WorldError::AgentNotFound(id))
    }

    /// All agents, dead included, in `(spawn_index, id)` order.
    pub async fn get_all_agents(&self) -> Vec<Agent> {
        let inner = self.inner.read().await;
        let mut agents: Vec<Agent> = inner.agents.values().cloned().collect();
        agents.sort_by_key(|a| (a.spawn_index, a.id));
        agents
    }

    /// All alive agents in the deterministic `(spawn_index, id)` order the
    /// tick engine processes them in.
    pub async fn get_alive_agents(&self) -> Vec<Agent> {
        let inner = self.inner.read().await;
        let mut agents: Vec<Agent> = inner
            .agents
            .values()
            .filter(|a| a.is_alive())
            .cloned()
            .collect();
        agents.sort_by_key(|a| (a.spawn_index, a.id));
        agents
    }

    /// Apply a partial update to an agent. Last-writer-wins per field.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] when the id is unknown.
    pub async fn update_agent(&self, id: AgentId, patch: &AgentPatch) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&id)
            .ok_or(WorldError::AgentNotFound(id))?;
        patch.apply(agent);
        Ok(())
    }

    /// Add to (or, with a negative delta, remove from) an inventory slot.
    ///
    /// Quantities clamp at zero and empty entries are removed, so the slot
    /// never holds a zero.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] when the id is unknown.
    pub async fn add_to_inventory(
        &self,
        agent_id: AgentId,
        item: ItemType,
        delta: i64,
    ) -> Result<u64, WorldError> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&agent_id)
            .ok_or(WorldError::AgentNotFound(agent_id))?;
        let current = agent.inventory.get(&item).copied().unwrap_or(0);
        let next = if delta >= 0 {
            current.saturating_add(delta.unsigned_abs())
        } else {
            current.saturating_sub(delta.unsigned_abs())
        };
        if next == 0 {
            agent.inventory.remove(&item);
        } else {
            agent.inventory.insert(item, next);
        }
        Ok(next)
    }

    /// Append a memory to an agent's bounded trail (oldest dropped first).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] when the id is unknown.
    pub async fn append_memory(
        &self,
        agent_id: AgentId,
        memory: MemoryEntry,
    ) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&agent_id)
            .ok_or(WorldError::AgentNotFound(agent_id))?;
        agent.memories.push(memory);
        if agent.memories.len() > MEMORY_LIMIT {
            let overflow = agent.memories.len() - MEMORY_LIMIT;
            agent.memories.drain(0..overflow);
        }
        Ok(())
    }

    /// Apply a proposed knowledge update to its owner.
    ///
    /// Sentiment accumulates (clamped to `-100..=100`); provenance is
    /// overwritten when the update carries any.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::AgentNotFound`] when the owner is unknown.
    pub async fn apply_knowledge_update(
        &self,
        update: &KnowledgeUpdate,
    ) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let agent = inner
            .agents
            .get_mut(&update.owner)
            .ok_or(WorldError::AgentNotFound(update.owner))?;
        let record = agent
            .knowledge
            .entry(update.subject)
            .or_insert_with(|| KnowledgeRecord::direct(update.tick));
        record.sentiment = (record.sentiment + update.sentiment_delta).clamp(-100, 100);
        record.tick = update.tick;
        if let Some(provenance) = &update.provenance {
            record.discovery_type = provenance.discovery_type;
            record.referred_by = provenance.referred_by;
            record.referral_depth = provenance.referral_depth;
        }
        Ok(())
    }

    // =========================================================================
    // Resource spawns
    // =========================================================================

    /// Insert a new resource spawn.
    pub async fn insert_spawn(&self, spawn: ResourceSpawn) {
        let mut inner = self.inner.write().await;
        inner.spawns.insert(spawn.id, spawn);
    }

    /// Read one spawn.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SpawnNotFound`] when the id is unknown.
    pub async fn get_spawn(&self, id: SpawnId) -> Result<ResourceSpawn, WorldError> {
        self.inner
            .read()
            .await
            .spawns
            .get(&id)
            .cloned()
            .ok_or(WorldError::SpawnNotFound(id))
    }

    /// All spawns, in id order.
    pub async fn get_all_spawns(&self) -> Vec<ResourceSpawn> {
        self.inner.read().await.spawns.values().cloned().collect()
    }

    /// Spawns at an exact cell, in id order.
    pub async fn get_resource_spawns_at_position(&self, x: i32, y: i32) -> Vec<ResourceSpawn> {
        self.inner
            .read()
            .await
            .spawns
            .values()
            .filter(|s| s.x == x && s.y == y)
            .cloned()
            .collect()
    }

    /// Atomically decrement a spawn and return what was granted:
    /// `min(wanted, current_amount)`. Returns 0 when depleted.
    ///
    /// Two concurrent calls serialize on the write lock and can never
    /// over-grant.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::SpawnNotFound`] when the id is unknown.
    pub async fn harvest_resource(
        &self,
        spawn_id: SpawnId,
        wanted: u64,
    ) -> Result<u64, WorldError> {
        let mut inner = self.inner.write().await;
        let spawn = inner
            .spawns
            .get_mut(&spawn_id)
            .ok_or(WorldError::SpawnNotFound(spawn_id))?;
        let granted = wanted.min(spawn.current_amount);
        spawn.current_amount -= granted;
        Ok(granted)
    }

    /// Regenerate every spawn by its rate, clamped to capacity.
    ///
    /// Returns `(spawn_id, units_added)` for spawns that actually gained,
    /// in id order.
    pub async fn regenerate_spawns(&self) -> Vec<(SpawnId, u64)> {
        let mut inner = self.inner.write().await;
        let mut regenerated = Vec::new();
        for spawn in inner.spawns.values_mut() {
            let next = spawn
                .current_amount
                .saturating_add(spawn.regen_rate)
                .min(spawn.max_amount);
            let added = next - spawn.current_amount;
            if added > 0 {
                spawn.current_amount = next;
                regenerated.push((spawn.id, added));
            }
        }
        regenerated
    }

    // =========================================================================
    // Shelters
    // =========================================================================

    /// Insert a new shelter.
    pub async fn insert_shelter(&self, shelter: Shelter) {
        let mut inner = self.inner.write().await;
        inner.shelters.insert(shelter.id, shelter);
    }

    /// All shelters, in id order.
    pub async fn get_all_shelters(&self) -> Vec<Shelter> {
        self.inner.read().await.shelters.values().cloned().collect()
    }

    /// Shelters at an exact cell.
    pub async fn get_shelters_at_position(&self, x: i32, y: i32) -> Vec<Shelter> {
        self.inner
            .read()
            .await
            .shelters
            .values()
            .filter(|s| s.x == x && s.y == y)
            .cloned()
            .collect()
    }

    /// Transfer shelter ownership (the `claim` action).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ShelterNotFound`] when the id is unknown.
    pub async fn set_shelter_owner(
        &self,
        shelter_id: ShelterId,
        owner: AgentId,
    ) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let shelter = inner
            .shelters
            .get_mut(&shelter_id)
            .ok_or(WorldError::ShelterNotFound(shelter_id))?;
        shelter.owner_agent = Some(owner);
        Ok(())
    }

    // =========================================================================
    // Named locations
    // =========================================================================

    /// Record a name for a cell (the `name_location` action).
    pub async fn name_location(&self, x: i32, y: i32, name: String) {
        let mut inner = self.inner.write().await;
        inner.named_locations.insert((x, y), name);
    }

    /// All cell names, keyed by `(x, y)`.
    pub async fn named_locations(&self) -> BTreeMap<(i32, i32), String> {
        self.inner.read().await.named_locations.clone()
    }

    // =========================================================================
    // External agents
    // =========================================================================

    /// Insert a new external agent registration.
    pub async fn insert_external_agent(&self, record: ExternalAgentRecord) {
        let mut inner = self.inner.write().await;
        inner.external_agents.insert(record.id, record);
    }

    /// Find an active registration by its API key digest.
    pub async fn find_external_by_key_hash(&self, hash: &str) -> Option<ExternalAgentRecord> {
        self.inner
            .read()
            .await
            .external_agents
            .values()
            .find(|r| r.is_active && r.api_key_hash == hash)
            .cloned()
    }

    /// Find a registration (active or not) by the simulation agent it
    /// controls.
    pub async fn find_external_by_agent(&self, agent_id: AgentId) -> Option<ExternalAgentRecord> {
        self.inner
            .read()
            .await
            .external_agents
            .values()
            .find(|r| r.agent_id == agent_id)
            .cloned()
    }

    /// Record an accepted decide call for rate limiting, returning `false`
    /// when the per-tick budget is already spent.
    ///
    /// The check-and-set is atomic under the write lock, so two racing
    /// decide calls in the same tick cannot both pass.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ExternalAgentNotFound`] when the id is unknown.
    pub async fn try_consume_decide_budget(
        &self,
        id: ExternalAgentId,
        tick: u64,
    ) -> Result<bool, WorldError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .external_agents
            .get_mut(&id)
            .ok_or(WorldError::ExternalAgentNotFound(id))?;
        if record.last_decide_tick == Some(tick) {
            return Ok(false);
        }
        record.last_decide_tick = Some(tick);
        record.last_seen_at = Some(Utc::now());
        Ok(true)
    }

    /// Update the last-seen timestamp for an authenticated request.
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ExternalAgentNotFound`] when the id is unknown.
    pub async fn touch_external_agent(&self, id: ExternalAgentId) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .external_agents
            .get_mut(&id)
            .ok_or(WorldError::ExternalAgentNotFound(id))?;
        record.last_seen_at = Some(Utc::now());
        Ok(())
    }

    /// Mark a registration inactive (deregistration).
    ///
    /// # Errors
    ///
    /// Returns [`WorldError::ExternalAgentNotFound`] when the id is unknown.
    pub async fn deactivate_external_agent(&self, id: ExternalAgentId) -> Result<(), WorldError> {
        let mut inner = self.inner.write().await;
        let record = inner
            .external_agents
            .get_mut(&id)
            .ok_or(WorldError::ExternalAgentNotFound(id))?;
        record.is_active = false;
        Ok(())
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    /// Build a full world snapshot for projections and variant capture.
    pub async fn build_snapshot(&self) -> WorldSnapshot {
        let inner = self.inner.read().await;
        let tick = inner.world_state.map_or(0, |s| s.current_tick);
        let mut agents: Vec<Agent> = inner.agents.values().cloned().collect();
        agents.sort_by_key(|a| (a.spawn_index, a.id));
        WorldSnapshot {
            tick,
            agents,
            resource_spawns: inner.spawns.values().cloned().collect(),
            shelters: inner.shelters.values().cloned().collect(),
            named_locations: inner
                .named_locations
                .iter()
                .map(|((x, y), name)| (format!("{x},{y}"), name.clone()))
                .collect(),
        }
    }
}
