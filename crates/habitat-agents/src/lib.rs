//! The action pipeline: validation, handlers, and vital mechanics.
//!
//! Handlers are pure functions `(intent, agent, context) -> ActionResult`.
//! They validate parameters, check preconditions against a read-only
//! context the engine assembled, and return proposed changes plus event
//! drafts. The tick engine commits both atomically per agent; a failed
//! result mutates nothing and surfaces as an `action_failed` event.

pub mod conflict;
pub mod context;
pub mod costs;
pub mod handlers;
pub mod validation;
pub mod vitals;

pub use context::HandlerContext;
pub use costs::{effective_cost, vitals_multiplier, ActionConfig};
pub use handlers::{finalize_gather, handle_intent, GatherFinalization};
pub use vitals::{advance_sleep, apply_needs_decay, DecayOutcome, SleepOutcome, VitalsConfig};
