//! The experiment controller: variant sequencing, seeded reset, and
//! snapshot capture.
//!
//! Exactly one variant may run at any instant, across all experiments.
//! Running the next pending variant tears the world down completely --
//! stop the engine, clear the projection and response caches, reset the
//! store, reseed the RNG -- then rebuilds it from the variant's
//! configuration and starts the engine after a short delay so SSE
//! subscribers can reconnect.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use habitat_adapters::GenesisClient;
use habitat_types::{
    AgentConfig, ConfigOverrides, EngineStatus, EventDraft, EventType, Experiment, ExperimentId,
    ExperimentStatus, Variant, VariantId, VariantStatus, WorldSize,
};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::{mpsc, RwLock};
use tracing::{info, warn};

use crate::engine::{ExperimentContext, TickEngine, VariantCompletion};
use crate::error::EngineError;
use crate::spawner::{spawn_world, SpawnSettings};

/// Delay between world setup and engine start, giving stream subscribers
/// a window to reconnect after the reset dropped them.
const START_DELAY: Duration = Duration::from_millis(500);

/// A variant as submitted through the API.
#[derive(Debug, Clone, Deserialize)]
pub struct VariantSpec {
    /// Display name.
    pub name: String,
    /// Configuration overrides for the run.
    #[serde(default)]
    pub config_overrides: ConfigOverrides,
    /// Explicit agent roster; empty means "use genesis or defaults".
    #[serde(default)]
    pub agent_configs: Vec<AgentConfig>,
    /// Policy type to drive genesis roster generation when no explicit
    /// roster is given.
    #[serde(default)]
    pub genesis_policy: Option<String>,
    /// World seed for the run.
    pub world_seed: u64,
    /// Hard run length in ticks.
    pub duration_ticks: u64,
}

/// Interior controller state.
struct ControllerInner {
    engine: TickEngine,
    genesis: GenesisClient,
    spawn_settings: SpawnSettings,
    world_size: WorldSize,
    experiments: RwLock<BTreeMap<ExperimentId, Experiment>>,
    snapshot_sink: RwLock<Option<mpsc::UnboundedSender<VariantCompletion>>>,
    /// Invalidates delayed engine starts: a teardown bumps the counter
    /// and any pending start from a previous variant becomes a no-op.
    start_generation: AtomicU64,
}

/// The experiment controller handle. Cheap to clone.
#[derive(Clone)]
pub struct ExperimentController {
    inner: Arc<ControllerInner>,
}

impl ExperimentController {
    /// Create a controller and spawn its completion listener.
    pub async fn new(
        engine: TickEngine,
        genesis: GenesisClient,
        spawn_settings: SpawnSettings,
        world_size: WorldSize,
    ) -> Self {
        let controller = Self {
            inner: Arc::new(ControllerInner {
                engine,
                genesis,
                spawn_settings,
                world_size,
                experiments: RwLock::new(BTreeMap::new()),
                snapshot_sink: RwLock::new(None),
                start_generation: AtomicU64::new(0),
            }),
        };

        if let Some(mut rx) = controller.inner.engine.take_variant_done_rx().await {
            let listener = controller.clone();
            drop(tokio::spawn(async move {
                while let Some(completion) = rx.recv().await {
                    listener.finalize_variant(completion).await;
                }
            }));
        }

        controller
    }

    /// Attach a sink for completion snapshots (the binary forwards these
    /// to the durable snapshot store).
    pub async fn set_snapshot_sink(&self, sink: mpsc::UnboundedSender<VariantCompletion>) {
        *self.inner.snapshot_sink.write().await = Some(sink);
    }

    /// The engine this controller drives.
    pub fn engine(&self) -> &TickEngine {
        &self.inner.engine
    }

    // =====================================================================
    // Experiment CRUD
    // =====================================================================

    /// Create an experiment in the planning state.
    pub async fn create_experiment(&self, name: String) -> Experiment {
        let experiment = Experiment {
            id: ExperimentId::new(),
            name,
            status: ExperimentStatus::Planning,
            variants: Vec::new(),
            created_at: Utc::now(),
        };
        let mut experiments = self.inner.experiments.write().await;
        let _ = experiments.insert(experiment.id, experiment.clone());
        experiment
    }

    /// All experiments, newest first.
    pub async fn list_experiments(&self) -> Vec<Experiment> {
        let experiments = self.inner.experiments.read().await;
        let mut all: Vec<Experiment> = experiments.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all
    }

    /// One experiment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for unknown ids.
    pub async fn get_experiment(&self, id: ExperimentId) -> Result<Experiment, EngineError> {
        self.inner
            .experiments
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(EngineError::ExperimentNotFound(id))
    }

    /// Delete an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for unknown ids and
    /// [`EngineError::VariantAlreadyRunning`] while one of its variants
    /// runs.
    pub async fn delete_experiment(&self, id: ExperimentId) -> Result<(), EngineError> {
        let mut experiments = self.inner.experiments.write().await;
        let experiment = experiments
            .get(&id)
            .ok_or(EngineError::ExperimentNotFound(id))?;
        if experiment.running_variant().is_some() {
            return Err(EngineError::VariantAlreadyRunning);
        }
        let _ = experiments.remove(&id);
        Ok(())
    }

    /// Append a variant to an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for unknown ids.
    pub async fn add_variant(
        &self,
        experiment_id: ExperimentId,
        spec: VariantSpec,
    ) -> Result<Variant, EngineError> {
        let variant = Variant {
            id: VariantId::new(),
            name: spec.name,
            status: VariantStatus::Pending,
            config_overrides: spec.config_overrides,
            agent_configs: spec.agent_configs,
            world_seed: spec.world_seed,
            duration_ticks: spec.duration_ticks,
            start_tick: None,
            end_tick: None,
        };
        let mut experiments = self.inner.experiments.write().await;
        let experiment = experiments
            .get_mut(&experiment_id)
            .ok_or(EngineError::ExperimentNotFound(experiment_id))?;
        experiment.variants.push(variant.clone());
        Ok(variant)
    }

    // =====================================================================
    // Variant lifecycle
    // =====================================================================

    /// Run an experiment's next pending variant.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::VariantAlreadyRunning`] while any variant
    /// runs, [`EngineError::ExperimentNotFound`] for unknown ids, and
    /// [`EngineError::NoPendingVariant`] when nothing is pending.
    pub async fn run_next_variant(
        &self,
        experiment_id: ExperimentId,
        genesis_policy_hint: Option<String>,
    ) -> Result<Variant, EngineError> {
        let engine = &self.inner.engine;

        // 1. Exactly one running variant across the whole controller.
        {
            let experiments = self.inner.experiments.read().await;
            if experiments.values().any(|e| e.running_variant().is_some()) {
                return Err(EngineError::VariantAlreadyRunning);
            }
        }
        if engine.experiment_context().await.is_some() {
            return Err(EngineError::VariantAlreadyRunning);
        }

        let variant = {
            let experiments = self.inner.experiments.read().await;
            let experiment = experiments
                .get(&experiment_id)
                .ok_or(EngineError::ExperimentNotFound(experiment_id))?;
            experiment
                .next_pending()
                .cloned()
                .ok_or(EngineError::NoPendingVariant(experiment_id))?
        };

        info!(
            experiment = %experiment_id,
            variant = %variant.id,
            seed = variant.world_seed,
            duration = variant.duration_ticks,
            "Running variant"
        );

        // 2. Tear down: stop, clear caches, reset, reseed.
        engine.stop_and_wait().await;
        let deps = engine.deps().clone();
        deps.projections.clear().await;
        deps.adapters.clear_cache().await;
        deps.store.reset_world_data().await;
        deps.log.clear_retained().await;
        engine.reseed(variant.world_seed).await;

        // 3. Variant overrides.
        engine.apply_overrides(&variant.config_overrides).await;

        // 4. Rebuild the world.
        let _ = deps.store.init_world_state(self.inner.world_size).await;
        let roster = self
            .resolve_roster(&variant.agent_configs, genesis_policy_hint, variant.world_seed)
            .await;
        let mut spawn_rng = engine.spawn_rng().await;
        let spawn_events = spawn_world(
            &deps.store,
            self.inner.world_size,
            &roster,
            &self.inner.spawn_settings,
            &mut spawn_rng,
        )
        .await;
        for draft in spawn_events {
            let event = deps.log.append(0, draft).await;
            deps.projections.on_event(&event).await;
            let _ = deps.bus.publish(&event);
        }
        let started_event = deps
            .log
            .append(
                0,
                EventDraft::world(
                    EventType::VariantStarted,
                    json!({
                        "experimentId": experiment_id,
                        "variantId": variant.id,
                        "worldSeed": variant.world_seed,
                        "durationTicks": variant.duration_ticks,
                    }),
                ),
            )
            .await;
        deps.projections.on_event(&started_event).await;
        let _ = deps.bus.publish(&started_event);

        // 5. Bookkeeping: engine context and statuses.
        engine
            .set_experiment_context(ExperimentContext {
                experiment_id,
                variant_id: variant.id,
                duration_ticks: variant.duration_ticks,
                start_tick: 0,
            })
            .await;
        let started = {
            let mut experiments = self.inner.experiments.write().await;
            let experiment = experiments
                .get_mut(&experiment_id)
                .ok_or(EngineError::ExperimentNotFound(experiment_id))?;
            experiment.status = ExperimentStatus::Running;
            let Some(stored) = experiment
                .variants
                .iter_mut()
                .find(|v| v.id == variant.id)
            else {
                return Err(EngineError::NoPendingVariant(experiment_id));
            };
            stored.status = VariantStatus::Running;
            stored.start_tick = Some(0);
            stored.clone()
        };

        // 6. Delayed start so subscribers can reattach. A teardown in the
        // window invalidates this start via the generation counter.
        let generation = self
            .inner
            .start_generation
            .fetch_add(1, Ordering::SeqCst)
            + 1;
        let engine = engine.clone();
        let inner = Arc::clone(&self.inner);
        drop(tokio::spawn(async move {
            tokio::time::sleep(START_DELAY).await;
            if inner.start_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            if let Err(err) = engine.start() {
                warn!(%err, "Variant engine start failed");
            }
        }));

        Ok(started)
    }

    /// Stop the running variant of an experiment.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ExperimentNotFound`] for unknown ids and
    /// [`EngineError::NotRunning`] when nothing is running.
    pub async fn stop_variant(&self, experiment_id: ExperimentId) -> Result<(), EngineError> {
        let engine = &self.inner.engine;
        let running_id = {
            let experiments = self.inner.experiments.read().await;
            let experiment = experiments
                .get(&experiment_id)
                .ok_or(EngineError::ExperimentNotFound(experiment_id))?;
            experiment
                .running_variant()
                .map(|v| v.id)
                .ok_or(EngineError::NotRunning)?
        };

        let _ = self.inner.start_generation.fetch_add(1, Ordering::SeqCst);
        engine.stop_and_wait().await;
        engine.clear_experiment_context().await;
        let end_tick = engine
            .deps()
            .store
            .get_world_state()
            .await
            .map_or(0, |s| s.current_tick);

        self.mark_variant_completed(experiment_id, running_id, end_tick)
            .await;
        Ok(())
    }

    /// Resolve the roster for a variant: explicit configs win, then a
    /// genesis roster for the hinted policy, then spawn defaults.
    async fn resolve_roster(
        &self,
        explicit: &[AgentConfig],
        genesis_policy: Option<String>,
        world_seed: u64,
    ) -> Vec<AgentConfig> {
        if !explicit.is_empty() {
            return explicit.to_vec();
        }
        if let Some(policy) = genesis_policy {
            return self
                .inner
                .genesis
                .generate_roster(
                    &self.inner.engine.deps().adapters,
                    &policy,
                    self.inner.spawn_settings.initial_agents,
                    world_seed,
                )
                .await;
        }
        self.inner.spawn_settings.default_agent_configs()
    }

    /// Handle an engine-reported variant completion.
    async fn finalize_variant(&self, completion: VariantCompletion) {
        info!(
            experiment = %completion.experiment_id,
            variant = %completion.variant_id,
            end_tick = completion.end_tick,
            "Variant completed"
        );
        self.mark_variant_completed(
            completion.experiment_id,
            completion.variant_id,
            completion.end_tick,
        )
        .await;
        if let Some(sink) = self.inner.snapshot_sink.read().await.as_ref()
            && sink.send(completion).is_err()
        {
            warn!("Snapshot sink closed; completion snapshot not persisted");
        }
    }

    /// Mark a variant completed and roll the experiment status forward.
    async fn mark_variant_completed(
        &self,
        experiment_id: ExperimentId,
        variant_id: VariantId,
        end_tick: u64,
    ) {
        let mut experiments = self.inner.experiments.write().await;
        let Some(experiment) = experiments.get_mut(&experiment_id) else {
            return;
        };
        if let Some(variant) = experiment.variants.iter_mut().find(|v| v.id == variant_id) {
            variant.status = VariantStatus::Completed;
            variant.end_tick = Some(end_tick);
        }
        experiment.status = if experiment.next_pending().is_some() {
            ExperimentStatus::Planning
        } else {
            ExperimentStatus::Completed
        };
    }

    // =====================================================================
    // Non-experiment world lifecycle (the /api/world surface)
    // =====================================================================

    /// Spawn the default world (if empty) and start the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::AlreadyRunning`] when the engine is not
    /// stopped.
    pub async fn start_world(&self) -> Result<(), EngineError> {
        let engine = &self.inner.engine;
        if engine.status() != EngineStatus::Stopped {
            return Err(EngineError::AlreadyRunning);
        }
        let deps = engine.deps().clone();
        let _ = deps.store.init_world_state(self.inner.world_size).await;

        if deps.store.get_all_agents().await.is_empty() {
            let roster = self.inner.spawn_settings.default_agent_configs();
            let mut spawn_rng = engine.spawn_rng().await;
            let events = spawn_world(
                &deps.store,
                self.inner.world_size,
                &roster,
                &self.inner.spawn_settings,
                &mut spawn_rng,
            )
            .await;
            let tick = deps.store.get_world_state().await.map_or(0, |s| s.current_tick);
            for draft in events {
                let event = deps.log.append(tick, draft).await;
                deps.projections.on_event(&event).await;
                let _ = deps.bus.publish(&event);
            }
        }
        engine.start()
    }

    /// Stop the engine and wipe the world back to an uninitialized state.
    ///
    /// The projection cache clears before the store re-initializes so no
    /// reader observes a stale snapshot.
    pub async fn reset_world(&self) {
        let engine = &self.inner.engine;
        let _ = self.inner.start_generation.fetch_add(1, Ordering::SeqCst);
        engine.stop_and_wait().await;
        engine.clear_experiment_context().await;

        let deps = engine.deps().clone();
        deps.projections.clear().await;
        deps.adapters.clear_cache().await;
        deps.store.reset_world_data().await;
        deps.log.clear_retained().await;
        let _ = deps.store.init_world_state(self.inner.world_size).await;

        let tick = 0;
        let event = deps
            .log
            .append(tick, EventDraft::world(EventType::WorldReset, json!({})))
            .await;
        deps.projections.on_event(&event).await;
        let _ = deps.bus.publish(&event);
        info!("World reset");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use habitat_adapters::{
        AdapterLayer, AdapterSettings, GenesisSettings, PolicyConfig,
    };
    use habitat_events::{BroadcastBus, EventLog, ProjectionCache};
    use habitat_world::WorldStore;

    use super::*;
    use crate::config::SimulationConfig;
    use crate::engine::EngineDeps;

    async fn make_controller() -> ExperimentController {
        let mut layer = AdapterLayer::new(
            AdapterSettings {
                test_mode: true,
                ..AdapterSettings::default()
            },
            None,
        )
        .unwrap();
        layer.register(PolicyConfig::fallback("fallback"));

        let deps = EngineDeps {
            store: WorldStore::new(),
            log: EventLog::new(),
            projections: ProjectionCache::new(),
            bus: BroadcastBus::new(),
            adapters: Arc::new(layer),
        };
        let config = SimulationConfig::parse("{}").unwrap();
        let engine = TickEngine::new(deps, &config);
        ExperimentController::new(
            engine,
            GenesisClient::new(GenesisSettings::default(), None),
            SpawnSettings::default(),
            WorldSize::default(),
        )
        .await
    }

    fn make_spec(seed: u64, duration: u64) -> VariantSpec {
        VariantSpec {
            name: format!("seed-{seed}"),
            config_overrides: ConfigOverrides::default(),
            agent_configs: Vec::new(),
            genesis_policy: None,
            world_seed: seed,
            duration_ticks: duration,
        }
    }

    #[tokio::test]
    async fn experiment_crud_round_trip() {
        let controller = make_controller().await;
        let experiment = controller.create_experiment(String::from("decay study")).await;
        assert_eq!(experiment.status, ExperimentStatus::Planning);

        let variant = controller
            .add_variant(experiment.id, make_spec(42, 100))
            .await
            .unwrap();
        assert_eq!(variant.status, VariantStatus::Pending);

        let loaded = controller.get_experiment(experiment.id).await.unwrap();
        assert_eq!(loaded.variants.len(), 1);

        controller.delete_experiment(experiment.id).await.unwrap();
        assert!(controller.get_experiment(experiment.id).await.is_err());
    }

    #[tokio::test]
    async fn run_next_variant_rebuilds_the_world() {
        let controller = make_controller().await;
        let experiment = controller.create_experiment(String::from("run")).await;
        let _ = controller
            .add_variant(experiment.id, make_spec(42, 100))
            .await
            .unwrap();

        let started = controller
            .run_next_variant(experiment.id, None)
            .await
            .unwrap();
        assert_eq!(started.status, VariantStatus::Running);
        assert_eq!(started.start_tick, Some(0));

        let deps = controller.engine().deps();
        let agents = deps.store.get_all_agents().await;
        assert_eq!(agents.len(), 5, "default roster spawned");
        assert!(controller.engine().experiment_context().await.is_some());

        // A second run attempt is rejected while this one is live.
        let second = controller.run_next_variant(experiment.id, None).await;
        assert!(matches!(second, Err(EngineError::VariantAlreadyRunning)));

        controller.stop_variant(experiment.id).await.unwrap();
        let loaded = controller.get_experiment(experiment.id).await.unwrap();
        assert_eq!(loaded.status, ExperimentStatus::Completed);
        assert_eq!(loaded.variants[0].status, VariantStatus::Completed);
    }

    #[tokio::test]
    async fn same_seed_produces_identical_worlds() {
        let controller = make_controller().await;
        let experiment = controller.create_experiment(String::from("repro")).await;
        let _ = controller
            .add_variant(experiment.id, make_spec(42, 100))
            .await
            .unwrap();
        let _ = controller
            .add_variant(experiment.id, make_spec(42, 100))
            .await
            .unwrap();

        let _ = controller
            .run_next_variant(experiment.id, None)
            .await
            .unwrap();
        let first_world: Vec<_> = {
            let deps = controller.engine().deps();
            deps.store
                .get_all_agents()
                .await
                .iter()
                .map(|a| (a.id, a.x, a.y))
                .collect()
        };
        controller.stop_variant(experiment.id).await.unwrap();

        let _ = controller
            .run_next_variant(experiment.id, None)
            .await
            .unwrap();
        let second_world: Vec<_> = {
            let deps = controller.engine().deps();
            deps.store
                .get_all_agents()
                .await
                .iter()
                .map(|a| (a.id, a.x, a.y))
                .collect()
        };
        controller.stop_variant(experiment.id).await.unwrap();

        assert_eq!(first_world, second_world, "reset + reseed is reproducible");
    }

    #[tokio::test]
    async fn reset_world_clears_everything() {
        let controller = make_controller().await;
        controller.start_world().await.unwrap();
        controller.engine().stop_and_wait().await;

        controller.reset_world().await;
        let deps = controller.engine().deps();
        assert!(deps.store.get_all_agents().await.is_empty());
        let state = deps.store.get_world_state().await.unwrap();
        assert_eq!(state.current_tick, 0);

        // The reset event is in the log and versions kept climbing.
        let recent = deps.log.recent(5).await;
        assert_eq!(recent[0].event_type, EventType::WorldReset);
    }
}
