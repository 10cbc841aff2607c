//! Uniform interface over the supported LLM backends.
//!
//! Each adapter translates one `(prompt, system_context)` pair into a single
//! vendor request and normalizes the reply into a [`GenerationResult`].
//! Adapters never retry and never mutate local state; the orchestrator
//! decides what to do with a failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, ProviderError};

pub mod anthropic;
pub mod cohere;
pub mod gemini;
pub mod huggingface;
pub mod ollama;
pub mod openai;
pub mod openai_compatible;

/// Per-call provider configuration. Constructed fresh from process
/// configuration for every request, optionally with a per-request override
/// of the provider identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

/// Normalized result of one generation call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResult {
    pub content: String,
    pub model: String,
    /// Provider-specific token accounting, passed through opaquely.
    pub usage: Value,
}

#[async_trait]
pub trait CodeProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// One outbound call. The system context is passed as a system-role
    /// message where the vendor supports one; otherwise the adapter prepends
    /// it to the prompt.
    async fn generate(
        &self,
        prompt: &str,
        system_context: &str,
    ) -> Result<GenerationResult, ProviderError>;
}

/// All registered identifiers, aliases included. `claude`/`anthropic` and
/// `gemini`/`google` are documented aliases resolving to the same adapter.
pub fn known_providers() -> Vec<&'static str> {
    vec![
        "openai",
        "claude",
        "anthropic",
        "gemini",
        "google",
        "groq",
        "mistral",
        "cohere",
        "huggingface",
        "ollama",
    ]
}

/// Single source of truth for which providers exist.
///
/// Matching is case-insensitive. Unknown identifiers fail with a message
/// that enumerates every valid option.
pub fn create_provider(
    id: &str,
    config: ProviderConfig,
) -> Result<Box<dyn CodeProvider>, AppError> {
    let provider: Box<dyn CodeProvider> = match id.to_lowercase().as_str() {
        "openai" => Box::new(openai::OpenAiProvider::new(config)?),
        "claude" | "anthropic" => Box::new(anthropic::AnthropicProvider::new(config)?),
        "gemini" | "google" => Box::new(gemini::GeminiProvider::new(config)?),
        "groq" => Box::new(openai_compatible::OpenAiCompatibleProvider::groq(config)?),
        "mistral" => Box::new(openai_compatible::OpenAiCompatibleProvider::mistral(config)?),
        "cohere" => Box::new(cohere::CohereProvider::new(config)?),
        "huggingface" => Box::new(huggingface::HuggingFaceProvider::new(config)?),
        "ollama" => Box::new(ollama::OllamaProvider::new(config)?),
        other => {
            return Err(AppError::UnknownProvider {
                requested: other.to_string(),
                valid: known_providers().join(", "),
            })
        }
    };
    Ok(provider)
}

/// Static catalog served by `GET /providers`.
pub fn catalog() -> Vec<Value> {
    vec![
        json!({
            "id": "openai",
            "name": "OpenAI",
            "models": ["gpt-4o", "gpt-4o-mini", "gpt-4-turbo"],
            "free": false,
        }),
        json!({
            "id": "claude",
            "name": "Anthropic Claude",
            "models": ["claude-3-5-sonnet-20241022", "claude-3-opus-20240229"],
            "free": false,
        }),
        json!({
            "id": "gemini",
            "name": "Google Gemini",
            "models": ["gemini-pro", "gemini-1.5-pro"],
            "free": true,
        }),
        json!({
            "id": "groq",
            "name": "Groq",
            "models": ["llama-3.3-70b-versatile", "mixtral-8x7b-32768"],
            "free": true,
        }),
        json!({
            "id": "mistral",
            "name": "Mistral AI",
            "models": ["mistral-small-latest", "mistral-large-latest"],
            "free": false,
        }),
        json!({
            "id": "cohere",
            "name": "Cohere",
            "models": ["command-r", "command-r-plus"],
            "free": false,
        }),
        json!({
            "id": "huggingface",
            "name": "Hugging Face",
            "models": ["mistralai/Mistral-7B-Instruct-v0.2", "bigcode/starcoder2-15b"],
            "free": true,
        }),
        json!({
            "id": "ollama",
            "name": "Ollama (Local)",
            "models": ["llama2", "codellama", "mistral"],
            "free": true,
            "local": true,
        }),
    ]
}

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, AppError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Internal(e.into()))
}

/// Shared non-2xx handling: capture the upstream status and body.
pub(crate) async fn error_for_status(
    provider: &'static str,
    response: reqwest::Response,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let detail = response.text().await.unwrap_or_default();
    Err(ProviderError::Api {
        provider,
        status: status.as_u16(),
        detail,
    })
}
