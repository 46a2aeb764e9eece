//! The Habitat engine binary.
//!
//! Wires the full stack: configuration (YAML + environment), optional
//! durable stores (`PostgreSQL` events/snapshots, Redis-compatible LLM
//! cache), the adapter layer, the tick engine, the experiment
//! controller, and the observer HTTP server. Without infrastructure URLs
//! the whole simulation runs in memory.

use std::path::Path;
use std::sync::Arc;

use habitat_adapters::{AdapterLayer, GenesisClient, PolicyConfig};
use habitat_core::{
    EngineDeps, ExperimentController, SimulationConfig, TickEngine, VariantCompletion,
};
use habitat_db::{EventStore, KvCache, PostgresPool, SnapshotStore};
use habitat_events::{BroadcastBus, EventLog, ProjectionCache};
use habitat_observer::AppState;
use habitat_types::{WorldEvent, WorldSize};
use habitat_world::WorldStore;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Default configuration file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "habitat-config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone())),
        )
        .init();
    info!(name = %config.world.name, seed = config.world.seed, "Habitat starting");

    // Optional infrastructure. Absence means fully in-memory operation.
    let kv = match &config.infrastructure.redis_url {
        Some(url) => match KvCache::connect(url).await {
            Ok(kv) => Some(kv),
            Err(err) => {
                warn!(%err, "KV cache unavailable; running without it");
                None
            }
        },
        None => None,
    };
    let postgres = match &config.infrastructure.postgres_url {
        Some(url) => match PostgresPool::connect(url).await {
            Ok(pool) => Some(pool),
            Err(err) => {
                warn!(%err, "PostgreSQL unavailable; events stay in memory");
                None
            }
        },
        None => None,
    };

    // The adapter layer: configured policies plus the always-present
    // deterministic fallback.
    let mut layer = AdapterLayer::new(config.adapters.clone(), kv.clone())?;
    layer.register(PolicyConfig::fallback("fallback"));
    for policy in &config.policies {
        layer.register(policy.clone());
    }
    let adapters = Arc::new(layer);

    // Event log: recover the durable version high-water mark before the
    // engine accepts any events.
    let log = EventLog::new();
    if let Some(pool) = &postgres {
        let max = EventStore::new(pool.pool()).max_version().await?;
        log.init_global_version(max).await;
        info!(version = max, "Event version counter recovered");
    }

    let deps = EngineDeps {
        store: WorldStore::new(),
        log,
        projections: ProjectionCache::new(),
        bus: BroadcastBus::new(),
        adapters,
    };
    let engine = TickEngine::new(deps, &config);

    // Durable event writer: the engine streams each tick's events here.
    if let Some(pool) = postgres.clone() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<WorldEvent>>();
        engine.set_persist_sink(tx).await;
        drop(tokio::spawn(async move {
            while let Some(events) = rx.recv().await {
                if let Err(err) = EventStore::new(pool.pool()).batch_insert(&events).await {
                    warn!(%err, "Event persistence failed");
                }
            }
        }));
    }

    let world_size = WorldSize {
        width: config.world.width,
        height: config.world.height,
    };
    let genesis = GenesisClient::new(config.genesis.clone(), kv);
    let controller = ExperimentController::new(
        engine,
        genesis,
        config.spawn.clone(),
        world_size,
    )
    .await;

    // Durable snapshot writer for completed variants.
    if let Some(pool) = postgres {
        let (tx, mut rx) = mpsc::unbounded_channel::<VariantCompletion>();
        controller.set_snapshot_sink(tx).await;
        drop(tokio::spawn(async move {
            while let Some(completion) = rx.recv().await {
                let store = SnapshotStore::new(pool.pool());
                if let Err(err) = store
                    .insert(
                        &completion.snapshot,
                        Some(completion.experiment_id),
                        Some(completion.variant_id),
                    )
                    .await
                {
                    warn!(%err, "Snapshot persistence failed");
                }
            }
        }));
    }

    let _ = controller
        .engine()
        .deps()
        .store
        .init_world_state(world_size)
        .await;

    let state = AppState::new(controller, config.observation.clone());
    habitat_observer::serve(state, config.infrastructure.port).await?;
    Ok(())
}

/// Load `habitat-config.yaml` when present, otherwise defaults; the
/// environment overrides either way.
fn load_config() -> SimulationConfig {
    let path = std::env::var("HABITAT_CONFIG")
        .unwrap_or_else(|_| String::from(DEFAULT_CONFIG_PATH));
    if Path::new(&path).exists() {
        match SimulationConfig::from_file(Path::new(&path)) {
            Ok(config) => return config,
            Err(err) => {
                // Subscriber is not up yet; stderr is the right channel.
                eprintln!("config error in {path}: {err}; using defaults");
            }
        }
    }
    SimulationConfig::from_env()
}
