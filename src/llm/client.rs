//! Backend trait, provider errors, and a scripted mock backend

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::llm::types::{CompletionRequest, CompletionResponse, ModelInfo};

/// An already-configured LLM backend handle.
///
/// Stateless: each call is independent. Implementations never retry; retry
/// policy belongs to the repair loop.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Provider name (openai, anthropic, gemini, ollama, mock)
    fn name(&self) -> &str;

    /// Model this handle talks to
    fn model(&self) -> &str;

    /// Single completion request
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError>;

    /// Models this provider offers
    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError>;
}

/// Infrastructure failures talking to an LLM backend
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("{provider} is unreachable: {message}")]
    Unreachable { provider: String, message: String },

    #[error("Request timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Missing API key for {provider}: run `manimator config --provider {provider} --key <key>`")]
    MissingApiKey { provider: String },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl ProviderError {
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ProviderError::RateLimited { .. })
    }
}

/// Map a non-success HTTP status to a provider error
pub(crate) fn error_for_status(status: StatusCode, retry_after: Option<u64>, body: String) -> ProviderError {
    match status.as_u16() {
        401 | 403 => ProviderError::Auth(body),
        429 => ProviderError::RateLimited {
            retry_after_secs: retry_after.unwrap_or(60),
        },
        code => ProviderError::Api { status: code, message: body },
    }
}

/// Map a transport failure; connection problems become `Unreachable`
pub(crate) fn error_for_send(provider: &str, err: reqwest::Error) -> ProviderError {
    if err.is_connect() {
        ProviderError::Unreachable {
            provider: provider.to_string(),
            message: err.to_string(),
        }
    } else if err.is_timeout() {
        ProviderError::Timeout { after_ms: 0 }
    } else {
        ProviderError::Network(err)
    }
}

/// Send a prepared request and decode the JSON body, mapping HTTP failures
pub(crate) async fn send_json(
    provider: &str,
    builder: reqwest::RequestBuilder,
) -> Result<serde_json::Value, ProviderError> {
    let response = builder.send().await.map_err(|e| error_for_send(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        return Err(error_for_status(status, retry_after, body));
    }

    response
        .json()
        .await
        .map_err(|e| ProviderError::MalformedResponse(format!("Failed to parse response: {}", e)))
}

/// Backend that replays scripted replies in order and records every request.
pub struct MockBackend {
    replies: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    models: Vec<ModelInfo>,
}

impl MockBackend {
    /// Create a mock that answers with the given code texts in order
    pub fn new<S: Into<String>>(replies: Vec<S>) -> Self {
        Self::scripted(replies.into_iter().map(|r| Ok(r.into())).collect())
    }

    /// Create a mock with explicit successes and failures
    pub fn scripted(replies: Vec<Result<String, ProviderError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
            models: vec![ModelInfo::new("mock-model", "n/a", "Instant", "Scripted replies")],
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of completion calls made
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, ProviderError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self.replies.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(Ok(text)) => Ok(CompletionResponse::text(text)),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::Unreachable {
                provider: "mock".to_string(),
                message: "no scripted replies left".to_string(),
            }),
        }
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, ProviderError> {
        Ok(self.models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_for_status_auth() {
        let err = error_for_status(StatusCode::UNAUTHORIZED, None, "bad key".to_string());
        assert!(matches!(err, ProviderError::Auth(_)));
        let err = error_for_status(StatusCode::FORBIDDEN, None, "nope".to_string());
        assert!(matches!(err, ProviderError::Auth(_)));
    }

    #[test]
    fn test_error_for_status_rate_limit() {
        let err = error_for_status(StatusCode::TOO_MANY_REQUESTS, Some(12), String::new());
        assert!(err.is_rate_limit());
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 12 }));

        let err = error_for_status(StatusCode::TOO_MANY_REQUESTS, None, String::new());
        assert!(matches!(err, ProviderError::RateLimited { retry_after_secs: 60 }));
    }

    #[test]
    fn test_error_for_status_api() {
        let err = error_for_status(StatusCode::INTERNAL_SERVER_ERROR, None, "boom".to_string());
        assert_eq!(err.to_string(), "API error 500: boom");
    }

    #[test]
    fn test_missing_key_message_mentions_config() {
        let err = ProviderError::MissingApiKey {
            provider: "openai".to_string(),
        };
        assert!(err.to_string().contains("manimator config --provider openai"));
    }

    #[tokio::test]
    async fn test_mock_backend_replays_in_order() {
        let mock = MockBackend::new(vec!["one", "two"]);
        let first = mock.complete(CompletionRequest::new("s")).await.unwrap();
        let second = mock.complete(CompletionRequest::new("s")).await.unwrap();
        assert_eq!(first.content, "one");
        assert_eq!(second.content, "two");
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_mock_backend_runs_dry() {
        let mock = MockBackend::new(Vec::<String>::new());
        let result = mock.complete(CompletionRequest::new("s")).await;
        assert!(matches!(result, Err(ProviderError::Unreachable { .. })));
    }

    #[tokio::test]
    async fn test_mock_backend_scripted_failure() {
        let mock = MockBackend::scripted(vec![Err(ProviderError::Auth("bad".to_string()))]);
        let result = mock.complete(CompletionRequest::new("s")).await;
        assert!(matches!(result, Err(ProviderError::Auth(_))));
    }

    #[tokio::test]
    async fn test_mock_backend_lists_models() {
        let mock = MockBackend::new(Vec::<String>::new());
        let models = mock.list_models().await.unwrap();
        assert_eq!(models[0].name, "mock-model");
    }

    #[test]
    fn test_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<MockBackend>();
    }
}
