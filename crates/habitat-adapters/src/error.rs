//! Error types for the adapter layer.
//!
//! Adapter failures never escape to the tick engine as errors: every
//! failure mode degrades to the deterministic fallback decision. The
//! variants here exist for logging and for the raw-prompt path where the
//! caller wants the real cause.

/// Errors that can occur in the adapter layer.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// An LLM backend HTTP call failed or returned an unusable body.
    #[error("backend error: {0}")]
    Backend(String),

    /// A prompt template failed to load or render.
    #[error("template error: {0}")]
    Template(String),

    /// The response could not be parsed into a valid decision.
    #[error("parse error: {0}")]
    Parse(String),

    /// The parsed decision failed schema validation.
    #[error("invalid decision: {0}")]
    Validation(String),

    /// No adapter is registered for the requested policy type.
    #[error("unknown policy type: {0}")]
    UnknownPolicy(String),

    /// The write-through cache backend failed (non-fatal; memory cache
    /// still serves).
    #[error("cache error: {0}")]
    Cache(String),
}
