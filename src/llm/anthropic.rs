//! Anthropic API backend
//!
//! Implements LlmBackend for the Anthropic (Claude) messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmBackend, ProviderError, send_json};
use crate::llm::provider::BackendConfig;
use crate::llm::types::{CompletionRequest, CompletionResponse, ModelInfo, Usage};

/// Anthropic API base URL
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

/// Anthropic API version
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Default model to use
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Anthropic API backend
pub struct AnthropicBackend {
    client: Client,
    api_key: String,
    config: BackendConfig,
}

impl AnthropicBackend {
    /// Create a backend with an explicit API key
    pub fn new(api_key: impl Into<String>, config: BackendConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// Build the request body for the Anthropic API
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": m.content
                })
            })
            .collect();

        let mut body = json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            "temperature": request.temperature.unwrap_or(self.config.temperature),
            "messages": messages
        });

        if !request.system.is_empty() {
            body["system"] = json!(request.system);
        }

        body
    }

    /// Parse the API response into a CompletionResponse
    fn parse_response(&self, body: Value) -> Result<CompletionResponse, ProviderError> {
        let usage = body
            .get("usage")
            .map(|u| {
                Usage::new(
                    u["input_tokens"].as_u64().unwrap_or(0),
                    u["output_tokens"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        let blocks = body["content"]
            .as_array()
            .ok_or_else(|| ProviderError::MalformedResponse("missing content array".to_string()))?;

        let mut content = String::new();
        for block in blocks {
            if block["type"].as_str() == Some("text") {
                if let Some(text) = block["text"].as_str() {
                    if !content.is_empty() {
                        content.push('\n');
                    }
                    content.push_str(text);
                }
            }
        }

        Ok(CompletionResponse { content, usage })
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(&request);
        let builder = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body);
        let response = send_json(self.name(), builder).await?;
        self.parse_response(response)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(catalog())
    }
}

impl std::fmt::Debug for AnthropicBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicBackend")
            .field("model", &self.config.model)
            .field("max_tokens", &self.config.max_tokens)
            .finish()
    }
}

/// Models offered by Anthropic
pub fn catalog() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new(
            "claude-opus-4-5",
            "200k tokens",
            "Powerful",
            "Most capable Claude model, best for complex animations",
        ),
        ModelInfo::new(
            "claude-sonnet-4-5",
            "200k tokens",
            "Balanced",
            "Great balance of intelligence and speed",
        ),
        ModelInfo::new(
            "claude-haiku-4-5",
            "200k tokens",
            "Fast",
            "Fastest Claude model, ideal for quick iterations",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::types::Message;

    fn backend() -> AnthropicBackend {
        AnthropicBackend::new("test-key", BackendConfig::with_model(DEFAULT_MODEL)).unwrap()
    }

    #[test]
    fn test_build_request_basic() {
        let request = CompletionRequest::new("You animate").with_user_message("a circle");
        let body = backend().build_request(&request);

        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["max_tokens"], 4096);
        assert_eq!(body["system"], "You animate");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "a circle");
    }

    #[test]
    fn test_build_request_keeps_history_order() {
        let request = CompletionRequest::new("s")
            .with_user_message("first")
            .with_message(Message::assistant("code"))
            .with_user_message("change it");
        let body = backend().build_request(&request);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1]["role"], "assistant");
    }

    #[test]
    fn test_build_request_without_system() {
        let request = CompletionRequest::default().with_user_message("hi");
        let body = backend().build_request(&request);
        assert!(body.get("system").is_none());
    }

    #[test]
    fn test_parse_response_text_blocks() {
        let response = backend()
            .parse_response(json!({
                "content": [
                    { "type": "text", "text": "from manim import *" },
                    { "type": "text", "text": "class GeneratedScene(Scene): pass" }
                ],
                "usage": { "input_tokens": 10, "output_tokens": 5 }
            }))
            .unwrap();

        assert!(response.content.starts_with("from manim import *\n"));
        assert_eq!(response.usage, Usage::new(10, 5));
    }

    #[test]
    fn test_parse_response_missing_content() {
        let result = backend().parse_response(json!({ "error": "nope" }));
        assert!(matches!(result, Err(ProviderError::MalformedResponse(_))));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let debug_str = format!("{:?}", backend());
        assert!(debug_str.contains("AnthropicBackend"));
        assert!(!debug_str.contains("test-key"));
    }

    #[tokio::test]
    async fn test_catalog_listing() {
        let models = backend().list_models().await.unwrap();
        assert!(models.iter().any(|m| m.name == "claude-sonnet-4-5"));
    }
}
