//! OpenAI chat-completions backend

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmBackend, ProviderError, send_json};
use crate::llm::provider::BackendConfig;
use crate::llm::types::{CompletionRequest, CompletionResponse, ModelInfo, Usage};

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

pub const DEFAULT_MODEL: &str = "gpt-4o";

/// OpenAI API backend
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    config: BackendConfig,
}

impl OpenAiBackend {
    pub fn new(api_key: impl Into<String>, config: BackendConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// The system prompt travels as the first message
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if !request.system.is_empty() {
            messages.push(json!({ "role": "system", "content": request.system }));
        }
        messages.extend(
            request
                .messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content })),
        );

        json!({
            "model": self.config.model,
            "messages": messages,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": request.temperature.unwrap_or(self.config.temperature),
        })
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, ProviderError> {
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse("missing choices[0].message.content".to_string()))?
            .to_string();

        let usage = body
            .get("usage")
            .map(|u| {
                Usage::new(
                    u["prompt_tokens"].as_u64().unwrap_or(0),
                    u["completion_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Ok(CompletionResponse { content, usage })
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(&request);
        let builder = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&body);
        let response = send_json(self.name(), builder).await?;
        self.parse_response(response)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(catalog())
    }
}

impl std::fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("model", &self.config.model)
            .finish()
    }
}

pub fn catalog() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new(
            "gpt-4o",
            "128k tokens",
            "Balanced",
            "Best overall: fast, smart, great at code generation",
        ),
        ModelInfo::new(
            "gpt-4-turbo",
            "128k tokens",
            "Balanced",
            "High-capability model with large context window",
        ),
        ModelInfo::new(
            "gpt-4o-mini",
            "128k tokens",
            "Fast",
            "Lightweight and cost-efficient for simpler animations",
        ),
        ModelInfo::new(
            "gpt-3.5-turbo",
            "16k tokens",
            "Very Fast",
            "Fastest and cheapest; best for simple scenes",
        ),
    ]
}
