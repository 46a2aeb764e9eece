//! The observer surface: REST reads, world lifecycle, the live SSE
//! stream, experiment control, replay, and the external agent gateway.
//!
//! Everything here is a view over the engine's shared dependencies. The
//! HTTP layer never mutates entities directly -- lifecycle routes go
//! through the experiment controller and external decisions go through
//! the engine's intent queue, the same pipeline internal agents use.

pub mod error;
pub mod experiments;
pub mod gateway;
pub mod handlers;
pub mod replay;
pub mod router;
pub mod server;
pub mod sse;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use server::serve;
pub use state::AppState;
