//! The adapter layer: the uniform `decide(observation) -> decision`
//! contract over every registered policy type.
//!
//! Policy types form a closed capability set: implement a backend, add a
//! [`PolicyConfig`], and register it by name -- no inheritance tree. All
//! per-call machinery (cache, vocabulary, normalization, parsing,
//! fallback) lives here so every policy goes through exactly the same
//! pipeline.

use std::collections::BTreeMap;

use habitat_agents::validation::validate_params;
use habitat_db::KvCache;
use habitat_types::{AgentDecision, IntentSource, Observation};
use rand::Rng;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::backend::{create_backend, LlmBackend};
use crate::cache::{observation_fingerprint, CacheStats, ResponseCache};
use crate::config::{AdapterSettings, BackendKind, PolicyConfig};
use crate::error::AdapterError;
use crate::fallback::fallback_decision;
use crate::normalize::{cap_tokens, enforce_latency_floor};
use crate::prompt::{PromptBuilder, RenderedPrompt};
use crate::vocab::VocabularyMap;

/// A registered policy: its configuration and (for LLM kinds) a backend.
struct PolicyHandle {
    config: PolicyConfig,
    backend: Option<LlmBackend>,
}

/// The outcome of one decide call.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionOutcome {
    /// The decision to act on.
    pub decision: AgentDecision,
    /// Whether the policy or the fallback produced it.
    pub source: IntentSource,
    /// Whether it came from the response cache.
    pub cached: bool,
}

/// Result of a raw prompt call (genesis and diagnostics).
#[derive(Debug, Clone)]
pub struct RawCallResult {
    /// The response text.
    pub response: String,
    /// Prompt tokens, when reported.
    pub input_tokens: Option<u64>,
    /// Completion tokens, when reported.
    pub output_tokens: Option<u64>,
}

/// The adapter registry and shared decide pipeline.
pub struct AdapterLayer {
    policies: BTreeMap<String, PolicyHandle>,
    cache: ResponseCache,
    prompts: PromptBuilder,
    vocabulary: VocabularyMap,
    settings: AdapterSettings,
}

impl AdapterLayer {
    /// Create an empty layer with the embedded prompt templates.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Template`] if the embedded templates fail
    /// to compile (a build defect, not a runtime condition).
    pub fn new(settings: AdapterSettings, kv: Option<KvCache>) -> Result<Self, AdapterError> {
        let cache = ResponseCache::new(settings.response_ttl_seconds, kv);
        let vocabulary = VocabularyMap::new(&settings.vocabulary);
        Ok(Self {
            policies: BTreeMap::new(),
            cache,
            prompts: PromptBuilder::new()?,
            vocabulary,
            settings,
        })
    }

    /// Replace the prompt builder (operator-tuned template directory).
    pub fn with_prompts(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    /// Register (or replace) a policy type.
    pub fn register(&mut self, config: PolicyConfig) {
        let backend = create_backend(&config);
        let _ = self.policies.insert(
            config.policy_type.clone(),
            PolicyHandle { config, backend },
        );
    }

    /// Whether a policy type is registered and able to serve decisions.
    ///
    /// Fallback policies are always available; LLM policies need a
    /// backend (an API key, at minimum).
    pub fn is_available(&self, policy_type: &str) -> bool {
        self.policies.get(policy_type).is_some_and(|handle| {
            handle.config.backend == BackendKind::Fallback
                || (handle.backend.is_some() && !handle.config.api_key.is_empty())
        })
    }

    /// Registered policy type names.
    pub fn policy_types(&self) -> Vec<String> {
        self.policies.keys().cloned().collect()
    }

    /// Response cache counters for the status endpoint.
    pub async fn cache_stats(&self) -> CacheStats {
        self.cache.stats().await
    }

    /// Drop the in-memory response cache (world reset).
    pub async fn clear_cache(&self) {
        self.cache.clear().await;
    }

    /// Whether TEST_MODE is forcing the fallback everywhere.
    pub const fn test_mode(&self) -> bool {
        self.settings.test_mode
    }

    /// Decide an action for an observation under a policy type.
    ///
    /// Never fails: every failure mode (unknown policy, backend error,
    /// unparsable response) degrades to the deterministic fallback, which
    /// is not cached.
    pub async fn decide<R: Rng>(
        &self,
        policy_type: &str,
        observation: &Observation,
        rng: &mut R,
    ) -> DecisionOutcome {
        // TEST_MODE short-circuits the entire LLM path for reproducibility.
        if self.settings.test_mode {
            return fallback_outcome(observation, rng);
        }

        let fingerprint = observation_fingerprint(policy_type, observation);

        // 1-2. Cache lookup. Hits re-validate exactly like fresh parses.
        if let Some(decision) = self.cache.get(policy_type, &fingerprint).await {
            if validate_params(&decision.params).is_ok() {
                return DecisionOutcome {
                    decision,
                    source: IntentSource::Policy,
                    cached: true,
                };
            }
            warn!(policy_type, "Cached decision failed validation; falling back");
            return fallback_outcome(observation, rng);
        }

        let Some(handle) = self.policies.get(policy_type) else {
            debug!(policy_type, "Unknown policy type; using fallback");
            return fallback_outcome(observation, rng);
        };
        let Some(backend) = &handle.backend else {
            return fallback_outcome(observation, rng);
        };

        // 3. Render the prompt, applying vocabulary substitution.
        let prompt = match self.prompts.render(observation) {
            Ok(prompt) => self.substitute(prompt),
            Err(err) => {
                warn!(policy_type, %err, "Prompt render failed; using fallback");
                return fallback_outcome(observation, rng);
            }
        };

        // 4. Invoke the model, recording start time for the floor.
        let started = Instant::now();
        let completion = match backend.complete(&prompt, handle.config.max_tokens).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(policy_type, %err, "Backend call failed; using fallback");
                return fallback_outcome(observation, rng);
            }
        };

        // 5. Capability normalization.
        let mut text = completion.text;
        if self.settings.normalization_enabled {
            enforce_latency_floor(
                started,
                std::time::Duration::from_millis(handle.config.latency_floor_ms),
            )
            .await;
            text = cap_tokens(&text, handle.config.max_tokens);
        }

        // Reverse the vocabulary substitution before parsing.
        let text = self.vocabulary.reverse(&text);

        // 6. Parse and validate; failures fall back and are not cached.
        let decision = match crate::parse::parse_decision(&text) {
            Ok(decision) => decision,
            Err(err) => {
                warn!(policy_type, %err, "Response rejected; using fallback");
                return fallback_outcome(observation, rng);
            }
        };

        // 7. Insert into the cache (write-through) and return.
        self.cache.insert(policy_type, &fingerprint, &decision).await;
        DecisionOutcome {
            decision,
            source: IntentSource::Policy,
            cached: false,
        }
    }

    /// Send a raw prompt through a policy's backend, bypassing the cache
    /// and the observation pipeline. Used by genesis and diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::UnknownPolicy`] for unregistered types,
    /// and [`AdapterError::Backend`] on call failure. Fallback policies
    /// have no raw-prompt path.
    pub async fn call_with_raw_prompt(
        &self,
        policy_type: &str,
        prompt: &RenderedPrompt,
    ) -> Result<RawCallResult, AdapterError> {
        let handle = self
            .policies
            .get(policy_type)
            .ok_or_else(|| AdapterError::UnknownPolicy(policy_type.to_owned()))?;
        let backend = handle.backend.as_ref().ok_or_else(|| {
            AdapterError::Backend(format!("policy {policy_type} has no LLM backend"))
        })?;

        let substituted = self.substitute(prompt.clone());
        let completion = backend
            .complete(&substituted, handle.config.max_tokens)
            .await?;
        Ok(RawCallResult {
            response: self.vocabulary.reverse(&completion.text),
            input_tokens: completion.input_tokens,
            output_tokens: completion.output_tokens,
        })
    }

    /// Apply vocabulary substitution to both prompt halves.
    fn substitute(&self, prompt: RenderedPrompt) -> RenderedPrompt {
        if self.vocabulary.is_empty() {
            return prompt;
        }
        RenderedPrompt {
            system: self.vocabulary.apply(&prompt.system),
            user: self.vocabulary.apply(&prompt.user),
        }
    }
}

/// Wrap the fallback decision in an outcome.
fn fallback_outcome<R: Rng>(observation: &Observation, rng: &mut R) -> DecisionOutcome {
    DecisionOutcome {
        decision: fallback_decision(observation, rng),
        source: IntentSource::Fallback,
        cached: false,
    }
}
