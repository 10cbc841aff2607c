use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{build_client, error_for_status, CodeProvider, GenerationResult, ProviderConfig};
use crate::error::{AppError, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.cohere.ai/v1";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    message: String,
    preamble: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    text: String,
    #[serde(default)]
    meta: Value,
}

/// Cohere's chat API takes a single `message` with the system context in a
/// separate `preamble` field. The reply has no model echo; the configured
/// model is reported instead.
pub struct CohereProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl CohereProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CodeProvider for CohereProvider {
    fn name(&self) -> &'static str {
        "cohere"
    }

    async fn generate(
        &self,
        prompt: &str,
        system_context: &str,
    ) -> Result<GenerationResult, ProviderError> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| ProviderError::MissingApiKey("cohere".to_string()))?;

        let url = format!(
            "{}/chat",
            self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
        );

        let api_request = ChatRequest {
            model: self.config.model.clone(),
            message: prompt.to_string(),
            preamble: system_context.to_string(),
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: "cohere",
                source,
            })?;
        let response = error_for_status("cohere", response).await?;

        let api_response: ChatResponse =
            response.json().await.map_err(|e| ProviderError::Shape {
                provider: "cohere",
                message: e.to_string(),
            })?;

        Ok(GenerationResult {
            content: api_response.text,
            model: self.config.model.clone(),
            usage: if api_response.meta.is_null() {
                json!({})
            } else {
                api_response.meta
            },
        })
    }
}
