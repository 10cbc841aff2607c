use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{build_client, error_for_status, CodeProvider, GenerationResult, ProviderConfig};
use crate::error::{AppError, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Value,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

pub struct AnthropicProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CodeProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "claude"
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
            .ok_or_else(|| ProviderError::MissingApiKey("claude".to_string()))?;

        let url = format!(
            "{}/messages",
            self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
        );

        let api_request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: system_context.to_string(),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&api_request)
            .send()
            .await
            .map_err(|source| ProviderError::Transport {
                provider: "claude",
                source,
            })?;
        let response = error_for_status("claude", response).await?;

        let api_response: MessagesResponse =
            response.json().await.map_err(|e| ProviderError::Shape {
                provider: "claude",
                message: e.to_string(),
            })?;

        let content = api_response
            .content
            .iter()
            .map(|block| block.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if content.is_empty() {
            return Err(ProviderError::Shape {
                provider: "claude",
                message: "response contained no text blocks".to_string(),
            });
        }

        Ok(GenerationResult {
            content,
            model: api_response.model,
            usage: if api_response.usage.is_null() {
                json!({})
            } else {
                api_response.usage
            },
        })
    }
}
