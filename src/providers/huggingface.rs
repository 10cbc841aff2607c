use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{build_client, error_for_status, CodeProvider, GenerationResult, ProviderConfig};
use crate::error::{AppError, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co";

#[derive(Debug, Serialize)]
struct InferenceRequest {
    inputs: String,
    parameters: InferenceParameters,
}

#[derive(Debug, Serialize)]
struct InferenceParameters {
    temperature: f32,
    max_new_tokens: u32,
    return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
    generated_text: String,
}

/// Hosted inference API. Text-generation models take a single `inputs`
/// string, so the system context is prepended to the prompt; token
/// accounting is not reported.
pub struct HuggingFaceProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl HuggingFaceProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CodeProvider for HuggingFaceProvider {
    fn name(&self) -> &'static str {
        "huggingface"
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
            .ok_or_else(|| ProviderError::MissingApiKey("huggingface".to_string()))?;

        let url = format!(
            "{}/models/{}",
            self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            self.config.model
        );

        let api_request = InferenceRequest {
            inputs: format!("{system_context}\n\n{prompt}"),
            parameters: InferenceParameters {
                temperature: self.config.temperature,
                max_new_tokens: self.config.max_tokens,
                return_full_text: false,
            },
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&api_request)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: "huggingface",
                source,
            })?;
        let response = error_for_status("huggingface", response).await?;

        let generations: Vec<Generation> =
            response.json().await.map_err(|e| ProviderError::Shape {
                provider: "huggingface",
                message: e.to_string(),
            })?;

        let generation = generations
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Shape {
                provider: "huggingface",
                message: "no generations in response".to_string(),
            })?;

        Ok(GenerationResult {
            content: generation.generated_text,
            model: self.config.model.clone(),
            usage: json!({}),
        })
    }
}
