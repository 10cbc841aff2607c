use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::providers::ProviderConfig;

/// Process configuration, read once from the environment at startup.
///
/// Per-request provider overrides are threaded through the pipeline as an
/// explicit parameter; nothing here is mutated after startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub template_path: PathBuf,
    pub default_provider: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    pub checkpoint_strategy: CheckpointStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointStrategy {
    Git,
    Copy,
    None,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3001,
            template_path: PathBuf::from("./template"),
            default_provider: "groq".to_string(),
            temperature: 0.7,
            max_tokens: 8000,
            timeout_secs: 120,
            checkpoint_strategy: CheckpointStrategy::Copy,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let checkpoint_strategy = match env::var("CHECKPOINT_STRATEGY").as_deref() {
            Ok("git") => CheckpointStrategy::Git,
            Ok("none") => CheckpointStrategy::None,
            _ => CheckpointStrategy::Copy,
        };

        Self {
            port: parse_env("PORT", defaults.port),
            template_path: env::var("TEMPLATE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.template_path),
            default_provider: env::var("AI_PROVIDER")
                .unwrap_or(defaults.default_provider)
                .to_lowercase(),
            temperature: parse_env("AI_TEMPERATURE", defaults.temperature),
            max_tokens: parse_env("AI_MAX_TOKENS", defaults.max_tokens),
            timeout_secs: parse_env("AI_TIMEOUT_SECS", defaults.timeout_secs),
            checkpoint_strategy,
        }
    }

    /// The directory all generated/read/deleted files must live under.
    pub fn source_root(&self) -> PathBuf {
        self.template_path.join("src")
    }

    /// Build the per-call provider configuration for `id`, pulling the
    /// vendor's credential/endpoint and default model from the environment.
    ///
    /// Aliases share a vendor: `claude`/`anthropic` and `gemini`/`google`
    /// read the same variables.
    pub fn provider_config(&self, id: &str) -> Result<ProviderConfig, AppError> {
        let id = id.to_lowercase();
        let (key_var, model_var, default_model, base_url) = match id.as_str() {
            "openai" => ("OPENAI_API_KEY", "OPENAI_MODEL", "gpt-4o-mini", None),
            "claude" | "anthropic" => (
                "CLAUDE_API_KEY",
                "CLAUDE_MODEL",
                "claude-3-5-sonnet-20241022",
                None,
            ),
            "gemini" | "google" => ("GEMINI_API_KEY", "GEMINI_MODEL", "gemini-pro", None),
            "groq" => ("GROQ_API_KEY", "GROQ_MODEL", "llama-3.3-70b-versatile", None),
            "mistral" => (
                "MISTRAL_API_KEY",
                "MISTRAL_MODEL",
                "mistral-small-latest",
                None,
            ),
            "cohere" => ("COHERE_API_KEY", "COHERE_MODEL", "command-r", None),
            "huggingface" => (
                "HUGGINGFACE_API_KEY",
                "HUGGINGFACE_MODEL",
                "mistralai/Mistral-7B-Instruct-v0.2",
                None,
            ),
            "ollama" => (
                "",
                "OLLAMA_MODEL",
                "llama2",
                Some(
                    env::var("OLLAMA_URL")
                        .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                ),
            ),
            other => {
                return Err(AppError::UnknownProvider {
                    requested: other.to_string(),
                    valid: crate::providers::known_providers().join(", "),
                })
            }
        };

        let api_key = if key_var.is_empty() {
            None
        } else {
            env::var(key_var).ok().filter(|k| !k.is_empty())
        };

        Ok(ProviderConfig {
            api_key,
            base_url,
            model: env::var(model_var).unwrap_or_else(|_| default_model.to_string()),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            timeout_secs: self.timeout_secs,
        })
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, default: T) -> T {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
