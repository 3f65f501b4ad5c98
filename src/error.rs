//! Error types for manimator
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::llm::ProviderError;
use crate::render::RenderError;

/// All error types that can occur in the manimator library
#[derive(Debug, Error)]
pub enum ManimatorError {
    /// Caller supplied something the core cannot work with
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid state transition or operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Prompt template failed to render
    #[error("Template error: {0}")]
    Template(String),

    /// LLM backend failure
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Rendering infrastructure failure
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for manimator operations
pub type Result<T> = std::result::Result<T, ManimatorError>;
