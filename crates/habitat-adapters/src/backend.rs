//! LLM backend implementations.
//!
//! Enum dispatch (async trait methods are not dyn-compatible) over two
//! wire formats: OpenAI-compatible chat completions and the Anthropic
//! Messages API. The layer does not care which model sits behind the URL;
//! it sends a prompt and expects text containing JSON back, plus token
//! usage when the API reports it.

use crate::error::AdapterError;
use crate::prompt::RenderedPrompt;

/// A completed backend call.
#[derive(Debug, Clone)]
pub struct RawCompletion {
    /// The response text.
    pub text: String,
    /// Prompt tokens, when the API reported usage.
    pub input_tokens: Option<u64>,
    /// Completion tokens, when the API reported usage.
    pub output_tokens: Option<u64>,
}

/// An LLM backend that can complete a prompt.
pub enum LlmBackend {
    /// OpenAI-compatible chat completions API (`OpenAI`, `DeepSeek`, Ollama).
    OpenAi(OpenAiBackend),
    /// Anthropic Messages API.
    Anthropic(AnthropicBackend),
}

impl LlmBackend {
    /// Send a prompt and return the completion.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Backend`] if the HTTP call fails or the
    /// response body cannot be extracted.
    pub async fn complete(
        &self,
        prompt: &RenderedPrompt,
        max_tokens: u32,
    ) -> Result<RawCompletion, AdapterError> {
        match self {
            Self::OpenAi(backend) => backend.complete(prompt, max_tokens).await,
            Self::Anthropic(backend) => backend.complete(prompt, max_tokens).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::OpenAi(_) => "openai-compatible",
            Self::Anthropic(_) => "anthropic",
        }
    }
}

// ---------------------------------------------------------------------------
// OpenAI-compatible backend
// ---------------------------------------------------------------------------

/// Backend for OpenAI-compatible chat completions APIs.
///
/// Sends requests to `{api_url}/chat/completions`.
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl OpenAiBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        max_tokens: u32,
    ) -> Result<RawCompletion, AdapterError> {
        let url = format!("{}/chat/completions", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": prompt.system},
                {"role": "user", "content": prompt.user}
            ],
            "temperature": 0.7,
            "max_tokens": max_tokens,
            "response_format": {"type": "json_object"}
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Backend(format!("OpenAI request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(AdapterError::Backend(format!(
                "OpenAI returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AdapterError::Backend(format!("OpenAI response parse failed: {e}")))?;

        extract_openai_completion(&json)
    }
}

/// Extract the text and usage from an OpenAI chat completions response.
fn extract_openai_completion(json: &serde_json::Value) -> Result<RawCompletion, AdapterError> {
    let text = json
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            AdapterError::Backend("OpenAI response missing choices[0].message.content".to_owned())
        })?;

    let usage = json.get("usage");
    Ok(RawCompletion {
        text,
        input_tokens: usage
            .and_then(|u| u.get("prompt_tokens"))
            .and_then(serde_json::Value::as_u64),
        output_tokens: usage
            .and_then(|u| u.get("completion_tokens"))
            .and_then(serde_json::Value::as_u64),
    })
}

// ---------------------------------------------------------------------------
// Anthropic Messages API backend
// ---------------------------------------------------------------------------

/// Backend for the Anthropic Messages API.
///
/// Differences from the OpenAI shape: `x-api-key` header instead of a
/// bearer token, the system prompt is a top-level field, and the response
/// text lives at `content[0].text`.
pub struct AnthropicBackend {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl AnthropicBackend {
    /// Create a new Anthropic Messages API backend.
    pub fn new(api_url: String, api_key: String, model: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            model,
        }
    }

    async fn complete(
        &self,
        prompt: &RenderedPrompt,
        max_tokens: u32,
    ) -> Result<RawCompletion, AdapterError> {
        let url = format!("{}/messages", self.api_url);

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": max_tokens,
            "system": prompt.system,
            "messages": [
                {"role": "user", "content": prompt.user}
            ]
        });

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Backend(format!("Anthropic request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            return Err(AdapterError::Backend(format!(
                "Anthropic returned {status}: {error_body}"
            )));
        }

        let json: serde_json::Value = response.json().await.map_err(|e| {
            AdapterError::Backend(format!("Anthropic response parse failed: {e}"))
        })?;

        extract_anthropic_completion(&json)
    }
}

/// Extract the text and usage from an Anthropic Messages API response.
fn extract_anthropic_completion(json: &serde_json::Value) -> Result<RawCompletion, AdapterError> {
    let text = json
        .get("content")
        .and_then(|c| c.get(0))
        .and_then(|b| b.get("text"))
        .and_then(serde_json::Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            AdapterError::Backend("Anthropic response missing content[0].text".to_owned())
        })?;

    let usage = json.get("usage");
    Ok(RawCompletion {
        text,
        input_tokens: usage
            .and_then(|u| u.get("input_tokens"))
            .and_then(serde_json::Value::as_u64),
        output_tokens: usage
            .and_then(|u| u.get("output_tokens"))
            .and_then(serde_json::Value::as_u64),
    })
}

// ---------------------------------------------------------------------------
// Factory
// ---------------------------------------------------------------------------

/// Create a backend from a policy configuration.
///
/// Returns `None` for [`BackendKind::Fallback`] -- those policies never
/// make network calls.
pub fn create_backend(config: &crate::config::PolicyConfig) -> Option<LlmBackend> {
    match config.backend {
        crate::config::BackendKind::OpenAi => Some(LlmBackend::OpenAi(OpenAiBackend::new(
            config.api_url.clone(),
            config.api_key.clone(),
            config.model.clone(),
        ))),
        crate::config::BackendKind::Anthropic => Some(LlmBackend::Anthropic(
            AnthropicBackend::new(
                config.api_url.clone(),
                config.api_key.clone(),
                config.model.clone(),
            ),
        )),
        crate::config::BackendKind::Fallback => None,
    }
}
