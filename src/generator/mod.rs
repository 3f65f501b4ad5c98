//! Code generation - one LLM round trip per attempt
//!
//! The generator turns a [`GenerationRequest`] into a [`CandidateArtifact`].
//! It picks the prompt shape from what the request carries (fresh prompt,
//! follow-up on working code, or a repair with classified feedback) and never
//! retries; that decision belongs to the repair loop.

mod types;

pub use types::{CandidateArtifact, Feedback, GenerationRequest, Prompt};

use std::sync::Arc;
use std::time::Duration;

use crate::error::{ManimatorError, Result};
use crate::llm::{CompletionRequest, LlmBackend, ProviderError};
use crate::prompt::PromptRenderer;
use crate::render::QualityPreset;

/// Default bound on one provider call
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

pub struct CodeGenerator {
    backend: Arc<dyn LlmBackend>,
    prompts: PromptRenderer,
    timeout: Duration,
}

impl CodeGenerator {
    pub fn new(backend: Arc<dyn LlmBackend>) -> Result<Self> {
        Ok(Self {
            backend,
            prompts: PromptRenderer::new()?,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn backend(&self) -> &dyn LlmBackend {
        self.backend.as_ref()
    }

    fn user_message(&self, request: &GenerationRequest) -> Result<String> {
        let text = request.prompt.text.as_str();
        match (&request.prior_code, &request.feedback) {
            (Some(code), Some(feedback)) => self.prompts.correction(
                code,
                feedback.kind,
                &feedback.excerpt,
                &feedback.hint,
                Some(text),
            ),
            (Some(code), None) => self.prompts.followup(code, text),
            (None, None) => self.prompts.initial(text),
            (None, Some(_)) => Err(ManimatorError::InvalidInput(
                "feedback needs the failing code as prior_code".to_string(),
            )),
        }
    }

    /// Ask the backend for one candidate.
    ///
    /// Fails with `InvalidInput` on an empty prompt and with a
    /// `ProviderError` when the backend fails, times out or replies with no
    /// code.
    pub async fn generate(&self, request: &GenerationRequest, quality: QualityPreset) -> Result<CandidateArtifact> {
        if request.prompt.is_empty() {
            return Err(ManimatorError::InvalidInput("prompt is empty".to_string()));
        }

        let completion =
            CompletionRequest::new(self.prompts.system(quality)?).with_user_message(self.user_message(request)?);

        log::info!(
            "Generating attempt {} with {}/{}",
            request.attempt,
            self.backend.name(),
            self.backend.model()
        );

        let response = match tokio::time::timeout(self.timeout, self.backend.complete(completion)).await {
            Ok(response) => response?,
            Err(_) => {
                return Err(ProviderError::Timeout {
                    after_ms: self.timeout.as_millis() as u64,
                }
                .into());
            }
        };
        log::debug!("Completion used {} tokens", response.usage.total());

        let code = extract_code_block(&response.content);
        if code.is_empty() {
            return Err(ProviderError::MalformedResponse(format!("{} returned no code", self.backend.name())).into());
        }

        Ok(CandidateArtifact::new(code, request.attempt))
    }
}

/// Strip markdown fences the model added despite being told not to.
///
/// A reply that opens with a fence loses the fence lines; otherwise the first
/// fenced block wins; otherwise the reply is taken as code.
pub fn extract_code_block(raw: &str) -> String {
    let raw = raw.trim();

    if raw.starts_with("```") {
        let mut lines: Vec<&str> = raw.lines().skip(1).collect();
        if lines.last().is_some_and(|l| l.trim() == "```") {
            lines.pop();
        }
        return lines.join("\n").trim().to_string();
    }

    if let Some(open) = raw.find("\n```") {
        let after = &raw[open + 1..];
        if let Some(body_start) = after.find('\n') {
            let body = &after[body_start + 1..];
            let end = body.find("```").unwrap_or(body.len());
            return body[..end].trim().to_string();
        }
    }

    raw.to_string()
}
