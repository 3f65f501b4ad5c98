//! LLM Backend Layer - pluggable providers behind one trait
//!
//! This module provides:
//! - Provider-neutral message types
//! - LlmBackend trait and ProviderError
//! - OpenAI, Anthropic, Gemini and Ollama backends
//! - Provider selection from configuration

pub mod anthropic;
pub mod client;
pub mod gemini;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicBackend;
pub use client::{LlmBackend, MockBackend, ProviderError};
pub use gemini::GeminiBackend;
pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;
pub use provider::{BackendConfig, ProviderKind, build_backend, build_listing_backend};
pub use types::{CompletionRequest, CompletionResponse, Message, ModelInfo, Role, Usage};
