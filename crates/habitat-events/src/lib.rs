//! Event sourcing for the Habitat simulation.
//!
//! Three pieces, all fed by the tick engine's commit path:
//!
//! - [`EventLog`] -- the append-only log of [`WorldEvent`]s keyed by a
//!   globally monotonic, gap-free version counter.
//! - [`ProjectionCache`] -- derived read models (recent events, lazily
//!   rebuilt world snapshot) that keep HTTP reads off the hot path.
//! - [`BroadcastBus`] -- lossy pub/sub fanout of committed events to live
//!   SSE subscribers. A view, not a log of record.
//!
//! [`WorldEvent`]: habitat_types::WorldEvent

pub mod bus;
pub mod log;
pub mod projection;

pub use bus::BroadcastBus;
pub use log::EventLog;
pub use projection::ProjectionCache;
