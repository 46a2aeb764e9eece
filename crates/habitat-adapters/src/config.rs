//! Adapter configuration: per-policy backends and layer-wide settings.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which backend implementation a policy talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// OpenAI-compatible chat completions API.
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
    /// No LLM: always the deterministic fallback. Used for control groups
    /// and TEST_MODE.
    Fallback,
}

/// Configuration for one registered policy type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Registry key; agents reference this via `policy_type`.
    pub policy_type: String,
    /// Backend implementation.
    pub backend: BackendKind,
    /// Base API URL (e.g. `https://api.openai.com/v1`).
    #[serde(default)]
    pub api_url: String,
    /// API key for the backend.
    #[serde(default)]
    pub api_key: String,
    /// Model identifier sent to the backend.
    #[serde(default)]
    pub model: String,
    /// Capability normalization: minimum wall-time a decide call takes,
    /// neutralizing raw latency advantages across policies.
    #[serde(default = "default_latency_floor_ms")]
    pub latency_floor_ms: u64,
    /// Capability normalization: cap on emitted tokens.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

const fn default_latency_floor_ms() -> u64 {
    0
}

const fn default_max_tokens() -> u32 {
    512
}

impl PolicyConfig {
    /// A fallback-only policy (control groups, TEST_MODE rosters).
    pub fn fallback(policy_type: impl Into<String>) -> Self {
        Self {
            policy_type: policy_type.into(),
            backend: BackendKind::Fallback,
            api_url: String::new(),
            api_key: String::new(),
            model: String::new(),
            latency_floor_ms: 0,
            max_tokens: default_max_tokens(),
        }
    }
}

/// Layer-wide adapter settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterSettings {
    /// When set, every `decide` returns the deterministic fallback --
    /// used for reproducibility runs (`TEST_MODE`).
    #[serde(default)]
    pub test_mode: bool,
    /// Whether capability normalization (latency floor, token cap) runs.
    #[serde(default = "default_true")]
    pub normalization_enabled: bool,
    /// TTL for cached responses, seconds. Default 7 days.
    #[serde(default = "default_response_ttl")]
    pub response_ttl_seconds: i64,
    /// Synthetic vocabulary substitution: domain term to neutral synonym.
    /// Applied to prompts, reversed on responses. Empty disables.
    #[serde(default)]
    pub vocabulary: BTreeMap<String, String>,
}

const fn default_true() -> bool {
    true
}

const fn default_response_ttl() -> i64 {
    habitat_db::kv::DEFAULT_RESPONSE_TTL_SECONDS
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            test_mode: false,
            normalization_enabled: true,
            response_ttl_seconds: default_response_ttl(),
            vocabulary: BTreeMap::new(),
        }
    }
}
