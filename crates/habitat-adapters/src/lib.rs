//! The LLM adapter layer: one uniform contract over heterogeneous
//! decision policies.
//!
//! [`AdapterLayer::decide`] runs the full pipeline for a policy type:
//! fingerprint and cache lookup, prompt rendering (with optional synthetic
//! vocabulary substitution), the backend call, capability normalization
//! (latency floor, token cap), JSON parsing with schema validation, and
//! write-through caching. Every failure mode degrades to the
//! deterministic, I/O-free [`fallback::fallback_decision`] -- which is
//! never cached, so recovery is reattempted at the policy level next tick.

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod fallback;
pub mod genesis;
pub mod normalize;
pub mod parse;
pub mod prompt;
pub mod vocab;

pub use adapter::{AdapterLayer, DecisionOutcome, RawCallResult};
pub use backend::{create_backend, LlmBackend};
pub use cache::{observation_fingerprint, CacheStats, ResponseCache};
pub use config::{AdapterSettings, BackendKind, PolicyConfig};
pub use error::AdapterError;
pub use fallback::fallback_decision;
pub use genesis::{GenesisClient, GenesisSettings};
pub use prompt::{PromptBuilder, RenderedPrompt};
pub use vocab::VocabularyMap;
