//! Requests and candidates exchanged with the generator

use serde::{Deserialize, Serialize};

use crate::classify::FailureKind;

/// User text for one turn, optionally anchored to code from an earlier turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    pub text: String,
    pub prior_code: Option<String>,
}

impl Prompt {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            prior_code: None,
        }
    }

    pub fn with_prior_code(mut self, code: impl Into<String>) -> Self {
        self.prior_code = Some(code.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// What the generator learns from a failed attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub kind: FailureKind,
    pub excerpt: String,
    pub hint: String,
}

impl Feedback {
    pub fn new(kind: FailureKind, excerpt: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            kind,
            excerpt: excerpt.into(),
            hint: hint.into(),
        }
    }
}

/// One attempt's input to the generator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: Prompt,
    pub prior_code: Option<String>,
    pub feedback: Option<Feedback>,
    pub attempt: u32,
}

impl GenerationRequest {
    /// First attempt of a turn; carries the prompt's own prior code
    pub fn initial(prompt: Prompt) -> Self {
        let prior_code = prompt.prior_code.clone();
        Self {
            prompt,
            prior_code,
            feedback: None,
            attempt: 1,
        }
    }

    /// Next attempt, repairing `failed_code`
    pub fn retry(&self, failed_code: impl Into<String>, feedback: Feedback) -> Self {
        Self {
            prompt: self.prompt.clone(),
            prior_code: Some(failed_code.into()),
            feedback: Some(feedback),
            attempt: self.attempt + 1,
        }
    }
}

/// Source text produced for one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateArtifact {
    pub code: String,
    pub attempt: u32,
}

impl CandidateArtifact {
    pub fn new(code: impl Into<String>, attempt: u32) -> Self {
        Self {
            code: code.into(),
            attempt,
        }
    }
}
