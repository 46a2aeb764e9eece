//! The data layer: durable Postgres stores and the Redis-compatible KV
//! cache.
//!
//! Both stores are optional at runtime. The engine runs fully in memory
//! when no URLs are configured; when they are, the event writer flushes
//! each tick's events to Postgres (recovering the version high-water mark
//! on startup) and the KV cache mirrors LLM responses, genesis results,
//! and projections.

pub mod error;
pub mod event_store;
pub mod experiment_store;
pub mod kv;
pub mod postgres;
pub mod snapshot_store;

pub use error::DbError;
pub use event_store::EventStore;
pub use experiment_store::ExperimentStore;
pub use kv::KvCache;
pub use postgres::PostgresPool;
pub use snapshot_store::SnapshotStore;
