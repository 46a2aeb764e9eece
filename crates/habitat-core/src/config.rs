//! Typed configuration for the Habitat engine.
//!
//! The canonical configuration lives in `habitat-config.yaml` at the
//! project root. Every field has a serde default matching the values in
//! the design documents, so a missing file or empty document yields a
//! runnable configuration. Environment variables override the YAML for
//! deployment-shaped settings:
//!
//! - `TICK_INTERVAL_MS` -- minimum wall-time between tick starts
//! - `REDIS_URL` / `DATABASE_URL` -- infrastructure endpoints
//! - `PORT` -- observer HTTP port
//! - `TEST_MODE` -- force the deterministic fallback for every adapter
//! - `GENESIS_CACHE_ENABLED` / `GENESIS_CACHE_TTL_SECONDS` /
//!   `GENESIS_CACHE_PREFIX` -- genesis cache surface

use std::path::Path;

use habitat_adapters::{AdapterSettings, GenesisSettings, PolicyConfig};
use habitat_agents::{ActionConfig, VitalsConfig};
use serde::Deserialize;

use crate::error::EngineError;
use crate::observation::ObservationConfig;
use crate::spawner::SpawnSettings;

/// Top-level simulation configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SimulationConfig {
    /// World-level settings (seed, timing, grid size).
    #[serde(default)]
    pub world: WorldSettings,

    /// World population settings.
    #[serde(default)]
    pub spawn: SpawnSettings,

    /// Needs decay and sleep recovery rates.
    #[serde(default)]
    pub vitals: VitalsConfig,

    /// Action economy values.
    #[serde(default)]
    pub actions: ActionConfig,

    /// Observation visibility settings.
    #[serde(default)]
    pub observation: ObservationConfig,

    /// Adapter-layer settings (TEST_MODE, normalization, vocabulary).
    #[serde(default)]
    pub adapters: AdapterSettings,

    /// Registered policy types.
    #[serde(default)]
    pub policies: Vec<PolicyConfig>,

    /// Genesis cache settings.
    #[serde(default)]
    pub genesis: GenesisSettings,

    /// Infrastructure endpoints.
    #[serde(default)]
    pub infrastructure: InfrastructureConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl SimulationConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the file cannot be read or the
    /// content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, EngineError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, EngineError> {
        let mut config: Self = serde_yml::from_str(yaml)
            .map_err(|e| EngineError::Config(format!("invalid YAML: {e}")))?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// A default configuration with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    /// Overlay the environment surface onto this configuration.
    pub fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse::<u64>("TICK_INTERVAL_MS") {
            self.world.tick_interval_ms = v;
        }
        if let Ok(v) = std::env::var("REDIS_URL")
            && !v.is_empty()
        {
            self.infrastructure.redis_url = Some(v);
        }
        if let Ok(v) = std::env::var("DATABASE_URL")
            && !v.is_empty()
        {
            self.infrastructure.postgres_url = Some(v);
        }
        if let Some(v) = env_parse::<u16>("PORT") {
            self.infrastructure.port = v;
        }
        if let Some(v) = env_truthy("TEST_MODE") {
            self.adapters.test_mode = v;
        }
        if let Some(v) = env_truthy("GENESIS_CACHE_ENABLED") {
            self.genesis.cache_enabled = v;
        }
        if let Some(v) = env_parse::<i64>("GENESIS_CACHE_TTL_SECONDS") {
            self.genesis.cache_ttl_seconds = v;
        }
        if let Ok(v) = std::env::var("GENESIS_CACHE_PREFIX")
            && !v.is_empty()
        {
            self.genesis.cache_prefix = v;
        }
    }
}

/// Parse an environment variable, ignoring absence and garbage.
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok()?.parse().ok()
}

/// Interpret an environment variable as a boolean flag.
fn env_truthy(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// World-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorldSettings {
    /// Human-readable simulation name.
    #[serde(default = "default_world_name")]
    pub name: String,

    /// Seed for the world RNG.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Minimum wall-time between tick starts, milliseconds. A tick that
    /// runs longer is followed immediately by the next.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Hard deadline for each agent's decision, milliseconds. Timeouts
    /// degrade to the fallback; they are normal, non-fatal events.
    #[serde(default = "default_decision_deadline_ms")]
    pub decision_deadline_ms: u64,

    /// Bounded worker count for the parallel decision phase.
    #[serde(default = "default_decision_concurrency")]
    pub decision_concurrency: usize,

    /// Grid columns.
    #[serde(default = "default_world_dim")]
    pub width: u32,

    /// Grid rows.
    #[serde(default = "default_world_dim")]
    pub height: u32,
}

fn default_world_name() -> String {
    String::from("habitat")
}

const fn default_seed() -> u64 {
    42
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_decision_deadline_ms() -> u64 {
    5000
}

const fn default_decision_concurrency() -> usize {
    8
}

const fn default_world_dim() -> u32 {
    100
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: default_seed(),
            tick_interval_ms: default_tick_interval_ms(),
            decision_deadline_ms: default_decision_deadline_ms(),
            decision_concurrency: default_decision_concurrency(),
            width: default_world_dim(),
            height: default_world_dim(),
        }
    }
}

/// Infrastructure endpoints. Both stores are optional; the engine runs
/// fully in memory when they are absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InfrastructureConfig {
    /// Redis-compatible KV URL (`REDIS_URL`).
    #[serde(default)]
    pub redis_url: Option<String>,

    /// `PostgreSQL` URL (`DATABASE_URL`).
    #[serde(default)]
    pub postgres_url: Option<String>,

    /// Observer HTTP port (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
}

const fn default_port() -> u16 {
    8080
}

impl Default for InfrastructureConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            postgres_url: None,
            port: default_port(),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter (overridden by `RUST_LOG`).
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    String::from("info")
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_yaml_yields_defaults() {
        let config = SimulationConfig::parse("{}").unwrap();
        assert_eq!(config.world.tick_interval_ms, 1000);
        assert_eq!(config.world.width, 100);
        assert_eq!(config.infrastructure.port, 8080);
        assert!(!config.adapters.test_mode);
    }

    #[test]
    fn yaml_fields_override_defaults() {
        let yaml = r"
world:
  seed: 7
  tick_interval_ms: 250
  width: 40
  height: 30
spawn:
  initial_agents: 3
";
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.world.seed, 7);
        assert_eq!(config.world.tick_interval_ms, 250);
        assert_eq!(config.world.width, 40);
        assert_eq!(config.spawn.initial_agents, 3);
    }

    #[test]
    fn bad_yaml_is_a_config_error() {
        assert!(matches!(
            SimulationConfig::parse("world: ["),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn policies_parse_from_yaml() {
        let yaml = r#"
policies:
  - policy_type: "claude"
    backend: anthropic
    api_url: "https://api.anthropic.com/v1"
    model: "claude-sonnet-4-20250514"
  - policy_type: "fallback"
    backend: fallback
"#;
        let config = SimulationConfig::parse(yaml).unwrap();
        assert_eq!(config.policies.len(), 2);
        assert_eq!(config.policies[0].policy_type, "claude");
    }
}
