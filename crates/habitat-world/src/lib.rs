//! The world store: transactional owner of all simulation entities.
//!
//! Every mutation of agents, resource spawns, shelters, and inventories
//! goes through [`WorldStore`]. All other components are read-only on these
//! entities -- they propose changes which the tick engine commits through
//! this crate. State lives in `BTreeMap`s behind a single `RwLock`, so
//! iteration order is deterministic and multi-entity operations (harvest,
//! trade legs) are atomic under the write lock.

pub mod error;
pub mod store;

pub use error::WorldError;
pub use store::WorldStore;
