//! Adapter for vendors speaking the OpenAI chat-completions wire format on
//! their own endpoints. Groq and Mistral differ only in base URL and
//! credential, so they share this implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{build_client, error_for_status, CodeProvider, GenerationResult, ProviderConfig};
use crate::error::{AppError, ProviderError};

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const MISTRAL_BASE_URL: &str = "https://api.mistral.ai/v1";

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

pub struct OpenAiCompatibleProvider {
    name: &'static str,
    base_url: String,
    config: ProviderConfig,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn groq(config: ProviderConfig) -> Result<Self, AppError> {
        Self::new("groq", GROQ_BASE_URL, config)
    }

    pub fn mistral(config: ProviderConfig) -> Result<Self, AppError> {
        Self::new("mistral", MISTRAL_BASE_URL, config)
    }

    fn new(
        name: &'static str,
        default_base_url: &str,
        config: ProviderConfig,
    ) -> Result<Self, AppError> {
        let client = build_client(config.timeout_secs)?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| default_base_url.to_string());
        Ok(Self {
            name,
            base_url,
            config,
            client,
        })
    }
}

#[async_trait]
impl CodeProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &'static str {
        self.name
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
            .ok_or_else(|| ProviderError::MissingApiKey(self.name.to_string()))?;

        let url = format!("{}/chat/completions", self.base_url);

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
                provider: self.name,
                source,
            })?;
        let response = error_for_status(self.name, response).await?;

        let api_response: ChatCompletionResponse =
            response.json().await.map_err(|e| ProviderError::Shape {
                provider: self.name,
                message: e.to_string(),
            })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::Shape {
                provider: self.name,
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
