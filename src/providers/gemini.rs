use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{build_client, error_for_status, CodeProvider, GenerationResult, ProviderConfig};
use crate::error::{AppError, ProviderError};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Value,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Content,
}

/// Gemini's v1 API has no system role; the system context is prepended to
/// the prompt text instead.
pub struct GeminiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CodeProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
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
            .ok_or_else(|| ProviderError::MissingApiKey("gemini".to_string()))?;

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL),
            self.config.model,
            api_key
        );

        let api_request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: format!("{system_context}\n\n{prompt}"),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.config.temperature,
                max_output_tokens: self.config.max_tokens,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&api_request)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: "gemini",
                source,
            })?;
        let response = error_for_status("gemini", response).await?;

        let api_response: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::Shape {
                provider: "gemini",
                message: e.to_string(),
            })?;

        let candidate = api_response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Shape {
                provider: "gemini",
                message: "no candidates in response".to_string(),
            })?;

        let content = candidate
            .content
            .parts
            .iter()
            .map(|part| part.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        Ok(GenerationResult {
            content,
            model: self.config.model.clone(),
            usage: if api_response.usage_metadata.is_null() {
                json!({})
            } else {
                api_response.usage_metadata
            },
        })
    }
}
