//! Local Ollama backend

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmBackend, ProviderError, send_json};
use crate::llm::provider::BackendConfig;
use crate::llm::types::{CompletionRequest, CompletionResponse, ModelInfo, Usage};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

pub const DEFAULT_MODEL: &str = "codellama:latest";

/// Backend for a locally running Ollama server. Needs no API key.
pub struct OllamaBackend {
    client: Client,
    base_url: String,
    config: BackendConfig,
}

impl OllamaBackend {
    pub fn new(base_url: impl Into<String>, config: BackendConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            config,
        })
    }

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
            "stream": false,
            "options": { "temperature": request.temperature.unwrap_or(self.config.temperature) }
        })
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, ProviderError> {
        let content = body["message"]["content"]
            .as_str()
            .ok_or_else(|| ProviderError::MalformedResponse("missing message.content".to_string()))?
            .to_string();

        let usage = Usage::new(
            body["prompt_eval_count"].as_u64().unwrap_or(0),
            body["eval_count"].as_u64().unwrap_or(0),
        );

        Ok(CompletionResponse { content, usage })
    }

    fn parse_tags(body: &Value) -> Vec<ModelInfo> {
        body["models"]
            .as_array()
            .map(|models| {
                models
                    .iter()
                    .map(|m| {
                        let name = m["name"].as_str().unwrap_or("unknown");
                        let size = match m["size"].as_u64() {
                            Some(bytes) if bytes > 0 => format!("{:.1}GB", bytes as f64 / 1e9),
                            _ => "?".to_string(),
                        };
                        ModelInfo::new(name, "varies", "Local", format!("Local model ({})", size))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    fn name(&self) -> &str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(&request);
        let builder = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&body);
        let response = send_json(self.name(), builder).await?;
        self.parse_response(response)
    }

    /// Installed models, or the recommended list when the server is down or empty
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        let builder = self.client.get(format!("{}/api/tags", self.base_url));
        match send_json(self.name(), builder).await {
            Ok(body) => {
                let models = Self::parse_tags(&body);
                Ok(if models.is_empty() { recommended() } else { models })
            }
            Err(ProviderError::Unreachable { .. }) => {
                log::warn!("Ollama not reachable at {}, showing recommended models", self.base_url);
                Ok(recommended())
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for OllamaBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaBackend")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .finish()
    }
}

/// Models worth pulling for Manim code generation
pub fn recommended() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new(
            "codellama:latest",
            "16k tokens",
            "Fast",
            "Code-specialized Llama model, great for Manim code generation",
        ),
        ModelInfo::new("llama3:latest", "8k tokens", "Fast", "General-purpose Llama 3"),
        ModelInfo::new(
            "mistral:latest",
            "32k tokens",
            "Fast",
            "Mistral 7B, fast and capable for code tasks",
        ),
        ModelInfo::new(
            "deepseek-coder:latest",
            "16k tokens",
            "Fast",
            "Excellent for Python code generation",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OllamaBackend {
        OllamaBackend::new("http://localhost:11434/", BackendConfig::with_model(DEFAULT_MODEL)).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(backend().base_url, "http://localhost:11434");
    }

    #[test]
    fn test_build_request_disables_streaming() {
        let request = CompletionRequest::new("sys").with_user_message("circle");
        let body = backend().build_request(&request);
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["model"], DEFAULT_MODEL);
    }

    #[test]
    fn test_parse_response() {
        let response = backend()
            .parse_response(json!({
                "message": { "role": "assistant", "content": "code" },
                "prompt_eval_count": 12,
                "eval_count": 8
            }))
            .unwrap();
        assert_eq!(response.content, "code");
        assert_eq!(response.usage.total(), 20);
    }

    #[test]
    fn test_parse_tags() {
        let models = OllamaBackend::parse_tags(&json!({
            "models": [
                { "name": "llama3:latest", "size": 4_700_000_000u64 },
                { "name": "tiny" }
            ]
        }));
        assert_eq!(models.len(), 2);
        assert_eq!(models[0].description, "Local model (4.7GB)");
        assert_eq!(models[1].description, "Local model (?)");
    }

    #[test]
    fn test_parse_tags_empty() {
        assert!(OllamaBackend::parse_tags(&json!({})).is_empty());
    }
}
