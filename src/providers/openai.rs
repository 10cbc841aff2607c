use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{build_client, error_for_status, CodeProvider, GenerationResult, ProviderConfig};
use crate::error::{AppError, ProviderError};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Value,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

pub struct OpenAiProvider {
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AppError> {
        let client = build_client(config.timeout_secs)?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl CodeProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
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
            .ok_or_else(|| ProviderError::MissingApiKey("openai".to_string()))?;

        let url = format!(
            "{}/chat/completions",
            self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
        );

        let api_request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_context.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
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
                provider: "openai",
                source,
            })?;
        let response = error_for_status("openai", response).await?;

        let api_response: ChatCompletionResponse =
            response.json().await.map_err(|e| ProviderError::Shape {
                provider: "openai",
                message: e.to_string(),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Shape {
                provider: "openai",
                message: "no choices in response".to_string(),
            })?;

        Ok(GenerationResult {
            content: choice.message.content,
            model: api_response.model,
            usage: if api_response.usage.is_null() {
                json!({})
            } else {
                api_response.usage
            },
        })
    }
}
