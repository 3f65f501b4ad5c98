//! Provider selection: turns resolved configuration into a backend handle

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::llm::client::{LlmBackend, ProviderError};
use crate::llm::{anthropic, gemini, ollama, openai};

/// Settings every backend shares
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            model: openai::DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            timeout: Duration::from_secs(120),
        }
    }
}

impl BackendConfig {
    /// Create a new config with a specific model
    pub fn with_model(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    Anthropic,
    Gemini,
    Ollama,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 4] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Ollama,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Ollama => "ollama",
        }
    }

    /// Model used when the configuration names none
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => openai::DEFAULT_MODEL,
            ProviderKind::Anthropic => anthropic::DEFAULT_MODEL,
            ProviderKind::Gemini => gemini::DEFAULT_MODEL,
            ProviderKind::Ollama => ollama::DEFAULT_MODEL,
        }
    }

    /// Environment variable consulted when no key is stored
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("OPENAI_API_KEY"),
            ProviderKind::Anthropic => Some("ANTHROPIC_API_KEY"),
            ProviderKind::Gemini => Some("GEMINI_API_KEY"),
            ProviderKind::Ollama => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        self.api_key_env().is_some()
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            "ollama" => Ok(ProviderKind::Ollama),
            other => Err(format!(
                "unknown provider '{}': choose from openai, anthropic, gemini, ollama",
                other
            )),
        }
    }
}

fn backend_config(config: &Config, kind: ProviderKind) -> BackendConfig {
    BackendConfig {
        model: config.model_for(kind),
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        timeout: Duration::from_millis(config.llm.timeout_ms),
    }
}

fn make_backend(
    config: &Config,
    kind: ProviderKind,
    api_key: String,
) -> Result<Box<dyn LlmBackend>, ProviderError> {
    let settings = backend_config(config, kind);
    let backend: Box<dyn LlmBackend> = match kind {
        ProviderKind::OpenAi => Box::new(openai::OpenAiBackend::new(api_key, settings)?),
        ProviderKind::Anthropic => Box::new(anthropic::AnthropicBackend::new(api_key, settings)?),
        ProviderKind::Gemini => Box::new(gemini::GeminiBackend::new(api_key, settings)?),
        ProviderKind::Ollama => Box::new(ollama::OllamaBackend::new(config.llm.ollama_url.clone(), settings)?),
    };
    Ok(backend)
}

/// Build the backend for the configured provider.
///
/// Fails with `MissingApiKey` when a keyed provider has no key in the
/// config or the environment.
pub fn build_backend(config: &Config) -> Result<Box<dyn LlmBackend>, ProviderError> {
    let kind = config.provider;
    let api_key = match config.api_key(kind) {
        Some(key) => key,
        None if kind.requires_api_key() => {
            return Err(ProviderError::MissingApiKey {
                provider: kind.to_string(),
            });
        }
        None => String::new(),
    };

    log::info!("Using provider {} with model {}", kind, config.model_for(kind));
    make_backend(config, kind, api_key)
}

/// Build a backend only for catalog listing; a key is not required
pub fn build_listing_backend(config: &Config, kind: ProviderKind) -> Result<Box<dyn LlmBackend>, ProviderError> {
    let api_key = config.api_key(kind).unwrap_or_default();
    make_backend(config, kind, api_key)
}
