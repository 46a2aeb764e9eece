//! The tick engine: the deterministic per-tick scheduler.
//!
//! One engine instance owns one world. Each tick runs four phases:
//!
//! 1. **Decision** (parallel, bounded) -- build an observation per alive,
//!    awake agent and ask its policy adapter to decide, under a hard
//!    per-agent deadline. Timeouts and adapter errors degrade to the
//!    deterministic fallback; external agents are served from the
//!    gateway's intent queue instead.
//! 2. **Application** (serial) -- run handlers in the deterministic
//!    `(spawn_index, id)` order, committing proposed changes and events
//!    atomically per agent. Failures emit `action_failed` and mutate
//!    nothing.
//! 3. **Environment** -- sleep progression, resource regeneration
//!    (clamped to capacity), needs decay, and death checks.
//! 4. **Commit** -- advance the tick counter, emit `tick_end`, flush the
//!    tick's events to the persistence sink, and close out a variant
//!    whose duration has elapsed.
//!
//! The configured tick interval is the *minimum* wall-time between tick
//! starts; a slow tick is followed immediately by the next.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use habitat_adapters::{fallback_decision, AdapterLayer};
use habitat_agents::{
    advance_sleep, apply_needs_decay, finalize_gather, handle_intent, ActionConfig,
    HandlerContext, VitalsConfig,
};
use habitat_events::{BroadcastBus, EventLog, ProjectionCache};
use habitat_types::{
    ActionIntent, ActionParams, ActionResult, Agent, AgentDecision, AgentId, AgentLifeState,
    AgentPatch, ConfigOverrides, EngineStatus, EventDraft, EventType, ExperimentId, IntentSource,
    Observation, VariantId, WorldEvent, WorldSnapshot,
};
use habitat_world::{WorldError, WorldStore};
use serde_json::json;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::SimulationConfig;
use crate::error::EngineError;
use crate::observation::{build_observation, ObservationConfig, WorldView};
use crate::rng::WorldRng;

/// Policy type reserved for gateway-driven agents. They never get adapter
/// calls; their intents arrive through the external queue or not at all.
pub const EXTERNAL_POLICY: &str = "external";

/// Poll interval while paused.
const PAUSE_POLL: Duration = Duration::from_millis(100);

/// The engine's shared dependencies.
#[derive(Clone)]
pub struct EngineDeps {
    /// The world store.
    pub store: WorldStore,
    /// The event log.
    pub log: EventLog,
    /// The projection cache.
    pub projections: ProjectionCache,
    /// The broadcast bus.
    pub bus: BroadcastBus,
    /// The adapter layer.
    pub adapters: Arc<AdapterLayer>,
}

/// Run-time tunables (variant overrides may change them between runs).
#[derive(Debug, Clone, Copy)]
struct RunSettings {
    tick_interval_ms: u64,
    decision_deadline_ms: u64,
    decision_concurrency: usize,
}

/// The experiment context the engine carries while a variant runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExperimentContext {
    /// The owning experiment.
    pub experiment_id: ExperimentId,
    /// The running variant.
    pub variant_id: VariantId,
    /// Hard run length in ticks.
    pub duration_ticks: u64,
    /// Tick at which the variant started.
    pub start_tick: u64,
}

/// Sent to the experiment controller when a variant's duration elapses.
#[derive(Debug, Clone)]
pub struct VariantCompletion {
    /// The owning experiment.
    pub experiment_id: ExperimentId,
    /// The completed variant.
    pub variant_id: VariantId,
    /// The tick the variant ended on.
    pub end_tick: u64,
    /// The world as it stood at completion.
    pub snapshot: WorldSnapshot,
}

/// Summary of one executed tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick that was executed.
    pub tick: u64,
    /// Alive agents at the start of the tick.
    pub agents_alive: usize,
    /// Decisions collected (policy + fallback + external).
    pub decisions: usize,
    /// Actions applied successfully.
    pub applied: usize,
    /// Actions rejected (`action_failed` emitted).
    pub failed: usize,
    /// Agents who died in the environment pass.
    pub deaths: usize,
}

/// Interior engine state.
struct EngineInner {
    deps: EngineDeps,
    settings: RwLock<RunSettings>,
    vitals: RwLock<VitalsConfig>,
    actions: ActionConfig,
    observation: ObservationConfig,
    rng: RwLock<WorldRng>,
    status_tx: watch::Sender<EngineStatus>,
    status_rx: watch::Receiver<EngineStatus>,
    external_intents: RwLock<BTreeMap<AgentId, ActionIntent>>,
    experiment: RwLock<Option<ExperimentContext>>,
    variant_done_tx: mpsc::UnboundedSender<VariantCompletion>,
    variant_done_rx: Mutex<Option<mpsc::UnboundedReceiver<VariantCompletion>>>,
    persist_tx: RwLock<Option<mpsc::UnboundedSender<Vec<WorldEvent>>>>,
    /// Held by the loop task for its whole life; `run_single_tick` uses
    /// `try_lock` so manual ticking and the loop cannot interleave.
    loop_guard: Mutex<()>,
}

/// The tick engine handle. Cheap to clone.
#[derive(Clone)]
pub struct TickEngine {
    inner: Arc<EngineInner>,
}

impl TickEngine {
    /// Create an engine over its dependencies and configuration.
    pub fn new(deps: EngineDeps, config: &SimulationConfig) -> Self {
        let (status_tx, status_rx) = watch::channel(EngineStatus::Stopped);
        let (variant_done_tx, variant_done_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(EngineInner {
                deps,
                settings: RwLock::new(RunSettings {
                    tick_interval_ms: config.world.tick_interval_ms,
                    decision_deadline_ms: config.world.decision_deadline_ms,
                    decision_concurrency: config.world.decision_concurrency.max(1),
                }),
                vitals: RwLock::new(config.vitals.clone()),
                actions: config.actions.clone(),
                observation: config.observation.clone(),
                rng: RwLock::new(WorldRng::new(config.world.seed)),
                status_tx,
                status_rx,
                external_intents: RwLock::new(BTreeMap::new()),
                experiment: RwLock::new(None),
                variant_done_tx,
                variant_done_rx: Mutex::new(Some(variant_done_rx)),
                persist_tx: RwLock::new(None),
                loop_guard: Mutex::new(()),
            }),
        }
    }

    /// The engine's shared dependencies.
    pub fn deps(&self) -> &EngineDeps {
        &self.inner.deps
    }

    /// Current lifecycle status.
    pub fn status(&self) -> EngineStatus {
        *self.inner.status_rx.borrow()
    }

    /// A watch receiver over lifecycle transitions.
    pub fn watch_status(&self) -> watch::Receiver<EngineStatus> {
        self.inner.status_rx.clone()
    }

    /// The current world seed.
    pub async fn seed(&self) -> u64 {
        self.inner.rng.read().await.seed()
    }

    /// Replace the world seed (variant reset).
    pub async fn reseed(&self, seed: u64) {
        self.inner.rng.write().await.reseed(seed);
    }

    /// A spawn-domain RNG stream derived from the current seed.
    pub async fn spawn_rng(&self) -> rand_chacha::ChaCha8Rng {
        self.inner
            .rng
            .read()
            .await
            .stream(crate::rng::RngDomain::Spawn, 0)
    }

    /// Apply a variant's configuration overrides.
    pub async fn apply_overrides(&self, overrides: &ConfigOverrides) {
        let mut settings = self.inner.settings.write().await;
        if let Some(interval) = overrides.tick_interval_ms {
            settings.tick_interval_ms = interval;
        }
        if let Some(deadline) = overrides.decision_deadline_ms {
            settings.decision_deadline_ms = deadline;
        }
        drop(settings);
        let mut vitals = self.inner.vitals.write().await;
        if let Some(rate) = overrides.hunger_decay_per_tick {
            vitals.hunger_decay_per_tick = rate;
        }
        if let Some(rate) = overrides.energy_decay_per_tick {
            vitals.energy_decay_per_tick = rate;
        }
    }

    /// Attach the durable event sink (a DB writer task's channel).
    pub async fn set_persist_sink(&self, sink: mpsc::UnboundedSender<Vec<WorldEvent>>) {
        *self.inner.persist_tx.write().await = Some(sink);
    }

    /// Set the experiment context before starting a variant run.
    pub async fn set_experiment_context(&self, ctx: ExperimentContext) {
        *self.inner.experiment.write().await = Some(ctx);
    }

    /// Clear the experiment context (manual stop).
    pub async fn clear_experiment_context(&self) {
        *self.inner.experiment.write().await = None;
    }

    /// The current experiment context, if a variant is running.
    pub async fn experiment_context(&self) -> Option<ExperimentContext> {
        *self.inner.experiment.read().await
    }

    /// Take the variant-completion receiver (once; the controller owns it).
    pub async fn take_variant_done_rx(
        &self,
    ) -> Option<mpsc::UnboundedReceiver<VariantCompletion>> {
        self.inner.variant_done_rx.lock().await.take()
    }

    /// Queue an external agent's decision for the next tick.
    ///
    /// One slot per agent: a second submission in the same tick window is
    /// rejected upstream by the gateway's rate limit, and a replacement
    /// before the tick runs is last-writer-wins.
    pub async fn submit_external_intent(&self, intent: ActionIntent) {
        let mut queue = self.inner.external_intents.write().await;
        let _ = queue.insert(intent.agent_id, intent);
    }

    /// Number of queued external intents (status endpoint).
    pub async fn external_queue_len(&self) -> usize {
        self.inner.external_intents.read().await.len()
    }

    // =====================================================================
    // Lifecycle
    // =====================================================================

    /// Start the tick loop.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] unless the engine is
    /// stopped.
    pub fn start(&self) -> Result<(), EngineError> {
        if self.status() != EngineStatus::Stopped {
            return Err(EngineError::AlreadyRunning);
        }
        let _ = self.inner.status_tx.send(EngineStatus::Starting);
        let engine = self.clone();
        drop(tokio::spawn(async move { engine.run_loop().await }));
        Ok(())
    }

    /// Request a stop. Safe to call in any state; the loop exits after
    /// the current tick commits.
    pub fn stop(&self) {
        let current = self.status();
        if current == EngineStatus::Stopped {
            return;
        }
        let _ = self.inner.status_tx.send(EngineStatus::Stopping);
    }

    /// Request a stop and wait for the loop to exit.
    pub async fn stop_and_wait(&self) {
        self.stop();
        let mut rx = self.watch_status();
        while *rx.borrow() != EngineStatus::Stopped {
            if rx.changed().await.is_err() {
                break;
            }
        }
    }

    /// Pause ticking. The loop stays alive.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotRunning`] unless the engine is running.
    pub async fn pause(&self) -> Result<(), EngineError> {
        if self.status() != EngineStatus::Running {
            return Err(EngineError::NotRunning);
        }
        self.inner.deps.store.pause_world().await?;
        let _ = self.inner.status_tx.send(EngineStatus::Paused);
        Ok(())
    }

    /// Resume ticking after a pause.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::NotRunning`] unless the engine is paused.
    pub async fn resume(&self) -> Result<(), EngineError> {
        if self.status() != EngineStatus::Paused {
            return Err(EngineError::NotRunning);
        }
        self.inner.deps.store.resume_world().await?;
        let _ = self.inner.status_tx.send(EngineStatus::Running);
        Ok(())
    }

    /// The loop task body.
    async fn run_loop(self) {
        let Ok(guard) = self.inner.loop_guard.try_lock() else {
            warn!("Tick loop already active; refusing a second");
            return;
        };

        // Starting -> Running, unless a stop raced the spawn.
        if self.status() == EngineStatus::Starting {
            let _ = self.inner.status_tx.send(EngineStatus::Running);
            info!("Engine running");
        }

        loop {
            match self.status() {
                EngineStatus::Stopping | EngineStatus::Stopped => break,
                EngineStatus::Paused => {
                    tokio::time::sleep(PAUSE_POLL).await;
                    continue;
                }
                EngineStatus::Starting | EngineStatus::Running => {}
            }

            let started = Instant::now();
            match self.run_tick_internal().await {
                Ok(summary) => {
                    debug!(
                        tick = summary.tick,
                        alive = summary.agents_alive,
                        applied = summary.applied,
                        failed = summary.failed,
                        deaths = summary.deaths,
                        "Tick committed"
                    );
                }
                Err(err) => {
                    // Commit-phase failures pause the engine rather than
                    // corrupting the stream with a half-applied tick.
                    error!(%err, "Tick failed; pausing engine");
                    if self.inner.deps.store.pause_world().await.is_ok() {
                        let _ = self.inner.status_tx.send(EngineStatus::Paused);
                    }
                    continue;
                }
            }

            let interval =
                Duration::from_millis(self.inner.settings.read().await.tick_interval_ms);
            let elapsed = started.elapsed();
            if elapsed < interval {
                let mut rx = self.watch_status();
                tokio::select! {
                    () = tokio::time::sleep(interval - elapsed) => {}
                    _ = rx.changed() => {}
                }
            }
        }

        drop(guard);
        let _ = self.inner.status_tx.send(EngineStatus::Stopped);
        info!("Engine stopped");
    }

    /// Execute exactly one tick while the loop is not running. Test and
    /// tooling entry point; the deterministic scenario suites drive the
    /// engine through this.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] while the loop holds the
    /// tick guard, or any commit-phase failure.
    pub async fn run_single_tick(&self) -> Result<TickSummary, EngineError> {
        let Ok(_guard) = self.inner.loop_guard.try_lock() else {
            return Err(EngineError::AlreadyRunning);
        };
        self.run_tick_internal().await
    }

    // =====================================================================
    // The tick algorithm
    // =====================================================================

    async fn run_tick_internal(&self) -> Result<TickSummary, EngineError> {
        let deps = &self.inner.deps;
        let state = deps.store.get_world_state().await?;
        let tick = state.current_tick + 1;

        let settings = *self.inner.settings.read().await;
        let vitals = self.inner.vitals.read().await.clone();
        let rng = *self.inner.rng.read().await;

        // Snapshot the world for observations.
        let agents = deps.store.get_alive_agents().await;
        let spawns = deps.store.get_all_spawns().await;
        let shelters = deps.store.get_all_shelters().await;
        let recent = deps.log.recent(100).await;
        let world_size = deps.store.world_size().await;
        let agents_alive = agents.len();

        // --- Decision phase (parallel, bounded) ---
        let mut external_queue = {
            let mut queue = self.inner.external_intents.write().await;
            std::mem::take(&mut *queue)
        };

        let mut deciders: Vec<(Agent, Observation)> = Vec::new();
        let mut intents: BTreeMap<AgentId, ActionIntent> = BTreeMap::new();
        {
            let view = WorldView {
                agents: &agents,
                spawns: &spawns,
                shelters: &shelters,
                recent_events: &recent,
                world_size,
            };
            for agent in &agents {
                if agent.state == AgentLifeState::Sleeping {
                    continue;
                }
                if let Some(intent) = external_queue.remove(&agent.id) {
                    let _ = intents.insert(agent.id, intent);
                    continue;
                }
                if agent.policy_type == EXTERNAL_POLICY {
                    // No submission this tick: the agent idles.
                    continue;
                }
                let observation =
                    build_observation(agent, &view, tick, &self.inner.observation);
                deciders.push((agent.clone(), observation));
            }
        }

        let deadline = Duration::from_millis(settings.decision_deadline_ms);
        let adapters = Arc::clone(&deps.adapters);
        let decided: Vec<(AgentId, ActionIntent)> = stream::iter(deciders.into_iter().map(
            |(agent, observation)| {
                let adapters = Arc::clone(&adapters);
                async move {
                    let mut agent_rng = rng.agent_stream(tick, agent.id);
                    let outcome = tokio::time::timeout(
                        deadline,
                        adapters.decide(&agent.policy_type, &observation, &mut agent_rng),
                    )
                    .await;
                    let (decision, source) = match outcome {
                        Ok(outcome) => (outcome.decision, outcome.source),
                        Err(_elapsed) => {
                            // Timeouts are normal, non-fatal events: the
                            // fallback answers from a fresh derived stream.
                            debug!(agent_id = %agent.id, tick, "Decision deadline hit");
                            let mut fallback_rng = rng.agent_stream(tick, agent.id);
                            (
                                fallback_decision(&observation, &mut fallback_rng),
                                IntentSource::Fallback,
                            )
                        }
                    };
                    (
                        agent.id,
                        ActionIntent {
                            agent_id: agent.id,
                            tick,
                            decision,
                            source,
                            submitted_at: Utc::now(),
                        },
                    )
                }
            },
        ))
        .buffer_unordered(settings.decision_concurrency)
        .collect()
        .await;
        for (agent_id, intent) in decided {
            let _ = intents.insert(agent_id, intent);
        }
        let decisions = intents.len();

        // --- Application phase (serial, deterministic order) ---
        let mut tick_events: Vec<WorldEvent> = Vec::new();
        let mut applied = 0_usize;
        let mut failed = 0_usize;
        for agent_snapshot in &agents {
            let Some(intent) = intents.remove(&agent_snapshot.id) else {
                continue;
            };
            // Fresh read: earlier commits this tick may have patched us.
            let agent = match deps.store.get_agent(agent_snapshot.id).await {
                Ok(agent) if agent.is_alive() => agent,
                _ => continue,
            };

            let ctx = self.build_handler_context(&agent, &intent, &agents, tick).await;
            let result = handle_intent(&intent, &agent, &ctx, &self.inner.actions);

            if result.success {
                match self
                    .commit_result(tick, &agent, &intent, result, &mut tick_events)
                    .await
                {
                    Ok(gather_failed) => {
                        if gather_failed {
                            failed += 1;
                        } else {
                            applied += 1;
                        }
                    }
                    Err(err) => {
                        // Transient storage trouble: this agent's tick is
                        // dropped, the tick itself continues.
                        warn!(agent_id = %agent.id, %err, "Agent commit dropped");
                        failed += 1;
                    }
                }
            } else {
                failed += 1;
                let reason = result.error.unwrap_or_else(|| String::from("rejected"));
                debug!(agent_id = %agent.id, action = %intent.decision.action_type(), reason, "Action rejected");
                self.append_event(
                    tick,
                    EventDraft::for_agent(
                        EventType::ActionFailed,
                        agent.id,
                        json!({
                            "action": intent.decision.action_type(),
                            "reason": reason,
                            "x": agent.x,
                            "y": agent.y,
                        }),
                    ),
                    &mut tick_events,
                )
                .await;
            }
        }

        // --- Environment phase ---
        let deaths = self
            .environment_pass(tick, &vitals, &agents, &mut tick_events)
            .await?;

        // --- Commit phase ---
        let committed = deps.store.advance_tick().await?;
        debug_assert_eq!(committed, tick);
        self.append_event(
            tick,
            EventDraft::world(EventType::TickEnd, json!({"tick": tick})),
            &mut tick_events,
        )
        .await;
        deps.store
            .set_global_event_version(deps.log.current_version().await)
            .await?;

        if let Some(sink) = self.inner.persist_tx.read().await.as_ref()
            && sink.send(tick_events).is_err()
        {
            warn!("Persistence sink closed; events remain in memory only");
        }

        self.check_variant_completion(tick).await;

        Ok(TickSummary {
            tick,
            agents_alive,
            decisions,
            applied,
            failed,
            deaths,
        })
    }

    /// Resolve everything a handler needs from the store snapshot.
    async fn build_handler_context(
        &self,
        agent: &Agent,
        intent: &ActionIntent,
        agents_snapshot: &[Agent],
        tick: u64,
    ) -> HandlerContext {
        let deps = &self.inner.deps;
        let spawns_here = deps
            .store
            .get_resource_spawns_at_position(agent.x, agent.y)
            .await;
        let shelters_here = deps.store.get_shelters_at_position(agent.x, agent.y).await;

        let (target_id, subject_id) = match &intent.decision.params {
            ActionParams::Trade {
                target_agent_id, ..
            }
            | ActionParams::Harm {
                target_agent_id, ..
            }
            | ActionParams::Steal {
                target_agent_id, ..
            }
            | ActionParams::Deceive {
                target_agent_id, ..
            } => (Some(*target_agent_id), None),
            ActionParams::ShareInfo {
                target_agent_id,
                subject_agent_id,
                ..
            } => (Some(*target_agent_id), Some(*subject_agent_id)),
            _ => (None, None),
        };

        let target = match target_id {
            Some(id) => deps.store.get_agent(id).await.ok(),
            None => None,
        };
        let subject = match subject_id {
            Some(id) => deps.store.get_agent(id).await.ok(),
            None => None,
        };

        // Witnesses: alive agents within the witness radius (Chebyshev),
        // excluding actor and target. Positions from the tick-start
        // snapshot keep the set deterministic.
        let witness_radius = self.inner.actions.witness_radius;
        let witnesses: Vec<AgentId> = if target_id.is_some() {
            agents_snapshot
                .iter()
                .filter(|other| {
                    other.id != agent.id
                        && Some(other.id) != target_id
                        && other.is_alive()
                        && other.x.abs_diff(agent.x).max(other.y.abs_diff(agent.y))
                            <= witness_radius
                })
                .map(|other| other.id)
                .collect()
        } else {
            Vec::new()
        };

        HandlerContext {
            tick,
            world_size: deps.store.world_size().await,
            spawns_here,
            shelters_here,
            target,
            subject,
            witnesses,
        }
    }

    /// Commit a successful handler result atomically per agent: harvest
    /// finalization, patches, inventories, world mutations, memories,
    /// knowledge, and event appends.
    ///
    /// Returns `true` when a gather finalization failed (the spawn ran
    /// dry between validation and harvest) -- the action counts as failed
    /// even though nothing else was committed.
    async fn commit_result(
        &self,
        tick: u64,
        agent: &Agent,
        intent: &ActionIntent,
        result: ActionResult,
        tick_events: &mut Vec<WorldEvent>,
    ) -> Result<bool, EngineError> {
        let deps = &self.inner.deps;
        let mut changes = result.changes;
        let mut events = result.events;

        if let Some(harvest) = changes.harvest.take() {
            let granted = self
                .with_retry(|| deps.store.harvest_resource(harvest.spawn_id, u64::from(harvest.quantity)))
                .await?;
            match finalize_gather(agent, &harvest, granted, tick) {
                Ok(finalized) => {
                    changes.agent_patches.push((agent.id, finalized.patch));
                    changes.inventory_deltas.push(finalized.inventory_delta);
                    changes.memories.push(finalized.memory);
                    events.push(finalized.event);
                }
                Err(reason) => {
                    self.append_event(
                        tick,
                        EventDraft::for_agent(
                            EventType::ActionFailed,
                            agent.id,
                            json!({
                                "action": intent.decision.action_type(),
                                "reason": reason,
                                "x": agent.x,
                                "y": agent.y,
                            }),
                        ),
                        tick_events,
                    )
                    .await;
                    return Ok(true);
                }
            }
        }

        for (agent_id, patch) in &changes.agent_patches {
            self.with_retry(|| deps.store.update_agent(*agent_id, patch))
                .await?;
        }
        for (agent_id, item, delta) in &changes.inventory_deltas {
            let _ = self
                .with_retry(|| deps.store.add_to_inventory(*agent_id, *item, *delta))
                .await?;
        }
        if let Some((shelter_id, owner)) = changes.shelter_owner {
            self.with_retry(|| deps.store.set_shelter_owner(shelter_id, owner))
                .await?;
        }
        if let Some((x, y, name)) = &changes.named_location {
            deps.store.name_location(*x, *y, name.clone()).await;
        }
        for (agent_id, memory) in &changes.memories {
            self.with_retry(|| deps.store.append_memory(*agent_id, memory.clone()))
                .await?;
        }
        for update in &changes.knowledge_updates {
            self.with_retry(|| deps.store.apply_knowledge_update(update))
                .await?;
        }
        for event in events {
            self.append_event(tick, event, tick_events).await;
        }
        Ok(false)
    }

    /// Sleep progression, resource regeneration, needs decay, deaths.
    ///
    /// `tick_start` is the alive-agents snapshot from the top of the tick:
    /// the death check compares against it so a vital zeroed mid-tick gets
    /// one full recovery opportunity before it kills.
    async fn environment_pass(
        &self,
        tick: u64,
        vitals: &VitalsConfig,
        tick_start: &[Agent],
        tick_events: &mut Vec<WorldEvent>,
    ) -> Result<usize, EngineError> {
        let deps = &self.inner.deps;

        // Sleep progression first: a sleeping agent recovers before the
        // decay step, which is what makes sleeping net-positive. Agents
        // who fell asleep during this tick's application phase (idle in
        // the snapshot) start counting down next tick, so a sleep(N)
        // skips N full decision phases.
        for agent in deps.store.get_alive_agents().await {
            if agent.state != AgentLifeState::Sleeping {
                continue;
            }
            let was_sleeping = tick_start
                .iter()
                .find(|a| a.id == agent.id)
                .is_some_and(|a| a.state == AgentLifeState::Sleeping);
            if !was_sleeping {
                continue;
            }
            let outcome = advance_sleep(&agent, vitals);
            let patch = AgentPatch {
                energy: Some(outcome.energy),
                sleep_ticks_remaining: Some(outcome.remaining),
                state: outcome.woke.then_some(AgentLifeState::Idle),
                ..AgentPatch::default()
            };
            deps.store.update_agent(agent.id, &patch).await?;
            if outcome.woke {
                self.append_event(
                    tick,
                    EventDraft::for_agent(
                        EventType::AgentWoke,
                        agent.id,
                        json!({"newEnergy": outcome.energy, "x": agent.x, "y": agent.y}),
                    ),
                    tick_events,
                )
                .await;
            }
        }

        let _regenerated = deps.store.regenerate_spawns().await;

        // Walking is a one-tick state; arrivals settle back to idle here.
        for agent in deps.store.get_alive_agents().await {
            if agent.state == AgentLifeState::Walking {
                let patch = AgentPatch {
                    state: Some(AgentLifeState::Idle),
                    ..AgentPatch::default()
                };
                deps.store.update_agent(agent.id, &patch).await?;
            }
        }

        let mut deaths = 0_usize;
        for agent in deps.store.get_alive_agents().await {
            let snapshot = tick_start
                .iter()
                .find(|a| a.id == agent.id)
                .unwrap_or(&agent);
            let outcome = apply_needs_decay(&agent, snapshot, vitals);
            let mut patch = AgentPatch {
                hunger: Some(outcome.hunger),
                energy: Some(outcome.energy),
                health: Some(outcome.health),
                ..AgentPatch::default()
            };
            if let Some(cause) = outcome.death {
                patch.state = Some(AgentLifeState::Dead);
                patch.died_at = Some(Utc::now());
                patch.death_cause = Some(cause);
            }
            deps.store.update_agent(agent.id, &patch).await?;

            self.append_event(
                tick,
                EventDraft::for_agent(
                    EventType::NeedsUpdated,
                    agent.id,
                    json!({
                        "hunger": outcome.hunger,
                        "energy": outcome.energy,
                        "health": outcome.health,
                    }),
                ),
                tick_events,
            )
            .await;

            if let Some(cause) = outcome.death {
                deaths += 1;
                info!(agent_id = %agent.id, %cause, tick, "Agent died");
                self.append_event(
                    tick,
                    EventDraft::for_agent(
                        EventType::AgentDied,
                        agent.id,
                        json!({"cause": cause.to_string(), "x": agent.x, "y": agent.y}),
                    ),
                    tick_events,
                )
                .await;
            }
        }
        Ok(deaths)
    }

    /// Close out the running variant when its duration has elapsed.
    async fn check_variant_completion(&self, tick: u64) {
        let ctx = { *self.inner.experiment.read().await };
        let Some(ctx) = ctx else { return };
        if tick.saturating_sub(ctx.start_tick) < ctx.duration_ticks {
            return;
        }

        info!(
            experiment = %ctx.experiment_id,
            variant = %ctx.variant_id,
            tick,
            "Variant duration reached; capturing snapshot and stopping"
        );
        let snapshot = self.inner.deps.store.build_snapshot().await;
        let mut sink: Vec<WorldEvent> = Vec::new();
        self.append_event(
            tick,
            EventDraft::world(
                EventType::VariantCompleted,
                json!({
                    "experimentId": ctx.experiment_id,
                    "variantId": ctx.variant_id,
                    "endTick": tick,
                }),
            ),
            &mut sink,
        )
        .await;
        if let Some(persist) = self.inner.persist_tx.read().await.as_ref() {
            let _ = persist.send(sink);
        }

        let _ = self.inner.variant_done_tx.send(VariantCompletion {
            experiment_id: ctx.experiment_id,
            variant_id: ctx.variant_id,
            end_tick: tick,
            snapshot,
        });
        *self.inner.experiment.write().await = None;
        self.stop();
    }

    /// Append a draft to the log, fan it out, and collect it for the
    /// persistence sink.
    async fn append_event(
        &self,
        tick: u64,
        draft: EventDraft,
        tick_events: &mut Vec<WorldEvent>,
    ) {
        let deps = &self.inner.deps;
        let event = deps.log.append(tick, draft).await;
        deps.projections.on_event(&event).await;
        let _ = deps.bus.publish(&event);
        tick_events.push(event);
    }

    /// Run a store operation, retrying once on a transient storage error.
    async fn with_retry<T, F, Fut>(&self, mut op: F) -> Result<T, EngineError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, WorldError>>,
    {
        match op().await {
            Ok(value) => Ok(value),
            Err(WorldError::Storage(first)) => {
                warn!(error = %first, "Transient storage error; retrying once");
                op().await.map_err(EngineError::World)
            }
            Err(other) => Err(EngineError::World(other)),
        }
    }
}

/// Build an external [`ActionIntent`] for the gateway.
pub fn external_intent(agent_id: AgentId, tick: u64, decision: AgentDecision) -> ActionIntent {
    ActionIntent {
        agent_id,
        tick,
        decision,
        source: IntentSource::External,
        submitted_at: Utc::now(),
    }
}
