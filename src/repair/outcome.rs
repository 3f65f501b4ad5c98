//! What a repair run hands back to its caller

use std::path::PathBuf;

use crate::classify::FailureKind;
use crate::llm::ProviderError;
use crate::render::QualityPreset;
use crate::repair::state::TransitionRecord;

/// Terminal failure of one request
#[derive(Debug, thiserror::Error)]
pub enum RepairFailure {
    /// Attempt budget spent, or a failure not worth retrying
    #[error("Gave up after {attempts} attempt(s) on a {kind}")]
    Exhausted {
        attempts: u32,
        kind: FailureKind,
        diagnostic: String,
    },

    /// LLM backend failed; retrying would not help
    #[error("LLM provider failed: {0}")]
    Provider(#[from] ProviderError),

    /// Render host is missing something no code change can supply
    #[error("Render environment problem: {0}")]
    Environment(String),
}

impl RepairFailure {
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            RepairFailure::Exhausted { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Last diagnostic text, for exhausted runs
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RepairFailure::Exhausted { diagnostic, .. } => Some(diagnostic),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub enum RepairOutcome {
    Done {
        video_path: PathBuf,
        version: u32,
        code: String,
    },
    Exhausted(RepairFailure),
}

/// Outcome plus how the run got there
#[derive(Debug)]
pub struct RepairReport {
    pub outcome: RepairOutcome,
    /// Generator calls made
    pub attempts: u32,
    pub transitions: Vec<TransitionRecord>,
}

impl RepairReport {
    pub fn is_done(&self) -> bool {
        matches!(self.outcome, RepairOutcome::Done { .. })
    }

    pub fn video_path(&self) -> Option<&PathBuf> {
        match &self.outcome {
            RepairOutcome::Done { video_path, .. } => Some(video_path),
            RepairOutcome::Exhausted(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&RepairFailure> {
        match &self.outcome {
            RepairOutcome::Exhausted(failure) => Some(failure),
            RepairOutcome::Done { .. } => None,
        }
    }
}

/// Progress notifications for a watching UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairEvent {
    Generating {
        attempt: u32,
        max_attempts: u32,
    },
    Generated {
        attempt: u32,
        code: String,
    },
    Rendering {
        attempt: u32,
        quality: QualityPreset,
    },
    RenderFailed {
        attempt: u32,
        kind: FailureKind,
        excerpt: String,
    },
    Retrying {
        next_attempt: u32,
        hint: String,
    },
    Done {
        video_path: PathBuf,
        version: u32,
    },
    Exhausted {
        reason: String,
    },
}
