//! Google Gemini generateContent backend

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use crate::llm::client::{LlmBackend, ProviderError, send_json};
use crate::llm::provider::BackendConfig;
use crate::llm::types::{CompletionRequest, CompletionResponse, ModelInfo, Role, Usage};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini API backend
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    config: BackendConfig,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, config: BackendConfig) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", GEMINI_API_BASE, self.config.model)
    }

    /// Gemini calls the assistant role "model"
    fn build_request(&self, request: &CompletionRequest) -> Value {
        let contents: Vec<Value> = request
            .messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                };
                json!({ "role": role, "parts": [{ "text": m.content }] })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature.unwrap_or(self.config.temperature),
                "maxOutputTokens": request.max_tokens.unwrap_or(self.config.max_tokens),
            }
        });

        if !request.system.is_empty() {
            body["systemInstruction"] = json!({ "parts": [{ "text": request.system }] });
        }

        body
    }

    fn parse_response(&self, body: Value) -> Result<CompletionResponse, ProviderError> {
        let parts = body["candidates"][0]["content"]["parts"]
            .as_array()
            .ok_or_else(|| ProviderError::MalformedResponse("no candidates in response".to_string()))?;

        let content = parts
            .iter()
            .filter_map(|p| p["text"].as_str())
            .collect::<Vec<_>>()
            .join("");

        let usage = body
            .get("usageMetadata")
            .map(|u| {
                Usage::new(
                    u["promptTokenCount"].as_u64().unwrap_or(0),
                    u["candidatesTokenCount"].as_u64().unwrap_or(0),
                )
            })
            .unwrap_or_default();

        Ok(CompletionResponse { content, usage })
    }
}

#[async_trait]
impl LlmBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        let body = self.build_request(&request);
        let builder = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        let response = send_json(self.name(), builder).await?;
        self.parse_response(response)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(catalog())
    }
}

impl std::fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("model", &self.config.model)
            .finish()
    }
}

pub fn catalog() -> Vec<ModelInfo> {
    vec![
        ModelInfo::new(
            "gemini-2.5-pro",
            "1M tokens",
            "Powerful",
            "Most capable Gemini model, best for complex animations",
        ),
        ModelInfo::new(
            "gemini-2.5-flash",
            "1M tokens",
            "Fast",
            "Fast and efficient, a good fit for most animations",
        ),
        ModelInfo::new(
            "gemini-2.0-flash",
            "1M tokens",
            "Very Fast",
            "Excellent speed with strong code generation",
        ),
    ]
}
