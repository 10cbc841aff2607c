use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{build_client, error_for_status, CodeProvider, GenerationResult, ProviderConfig};
use crate::error::{AppError, ProviderError};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
    #[serde(default)]
    eval_count: Option<u64>,
}

/// Locally-served models. No credential; the endpoint comes from
/// configuration. `/api/generate` has no system role, so the system context
/// is prepended to the prompt.
pub struct OllamaProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CodeProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    async fn generate(
        &self,
        prompt: &str,
        system_context: &str,
    ) -> Result<GenerationResult, ProviderError> {
        let url = format!(
            "{}/api/generate",
            self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
        );

        let api_request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: format!("{system_context}\n\n{prompt}"),
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                num_predict: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&api_request)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: "ollama",
                source,
            })?;
        let response = error_for_status("ollama", response).await?;

        let api_response: GenerateResponse =
            response.json().await.map_err(|e| ProviderError::Shape {
                provider: "ollama",
                message: e.to_string(),
            })?;

        Ok(GenerationResult {
            content: api_response.response,
            model: self.config.model.clone(),
            usage: json!({ "total_tokens": api_response.eval_count }),
        })
    }
}
