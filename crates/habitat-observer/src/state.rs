//! Shared application state for the observer server.

use habitat_core::{ExperimentController, ObservationConfig, TickEngine};
use habitat_world::WorldStore;

/// Shared state injected into every handler via Axum's `State` extractor.
///
/// Cheap to clone: everything inside is a shared handle.
#[derive(Clone)]
pub struct AppState {
    /// The experiment controller (which owns the engine handle).
    pub controller: ExperimentController,
    /// Observation settings for the gateway's observe endpoint.
    pub observation: ObservationConfig,
}

impl AppState {
    /// Assemble the application state.
    pub const fn new(controller: ExperimentController, observation: ObservationConfig) -> Self {
        Self {
            controller,
            observation,
        }
    }

    /// The tick engine.
    pub fn engine(&self) -> &TickEngine {
        self.controller.engine()
    }

    /// The world store.
    pub fn store(&self) -> &WorldStore {
        &self.engine().deps().store
    }
}
