//! Repair state machine - named states and legal transition guards
//!
//! Every request starts at `Generating` and ends at `Done` or `Exhausted`:
//! ```text
//! Generating  → Rendering | Exhausted
//! Rendering   → Done | Classifying | Exhausted
//! Classifying → Retrying | Exhausted
//! Retrying    → Generating
//! ```
//! Each `advance()` is checked against this table and logged.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::ManimatorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairState {
    /// Waiting on the LLM for a candidate
    Generating,
    /// Engine is running the candidate
    Rendering,
    /// Deciding what a failed render means
    Classifying,
    /// Building the next request from the failure
    Retrying,
    /// Video produced; terminal
    Done,
    /// Gave up; terminal
    Exhausted,
}

impl RepairState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Exhausted)
    }
}

impl fmt::Display for RepairState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Generating => "Generating",
            Self::Rendering => "Rendering",
            Self::Classifying => "Classifying",
            Self::Retrying => "Retrying",
            Self::Done => "Done",
            Self::Exhausted => "Exhausted",
        };
        f.write_str(name)
    }
}

fn is_legal_transition(from: RepairState, to: RepairState) -> bool {
    use RepairState::*;

    matches!(
        (from, to),
        (Generating, Rendering)
            | (Generating, Exhausted)
            | (Rendering, Done)
            | (Rendering, Classifying)
            | (Rendering, Exhausted)
            | (Classifying, Retrying)
            | (Classifying, Exhausted)
            | (Retrying, Generating)
    )
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RepairState,
    pub to: RepairState,
    /// Attempt number when the transition happened
    pub attempt: u32,
    /// Milliseconds since the request started
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Illegal repair transition: {from} -> {to}")]
pub struct IllegalTransition {
    pub from: RepairState,
    pub to: RepairState,
}

impl From<IllegalTransition> for ManimatorError {
    fn from(err: IllegalTransition) -> Self {
        ManimatorError::InvalidState(err.to_string())
    }
}

/// State of one request, with its transition log
#[derive(Debug)]
pub struct RepairMachine {
    current: RepairState,
    attempt: u32,
    started_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl Default for RepairMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RepairMachine {
    /// Start at `Generating`, attempt 1
    pub fn new() -> Self {
        Self {
            current: RepairState::Generating,
            attempt: 1,
            started_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RepairState {
        self.current
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    pub fn into_transitions(self) -> Vec<TransitionRecord> {
        self.transitions
    }

    /// Move to `to` if the table allows it. Entering `Generating` from
    /// `Retrying` starts the next attempt.
    pub fn advance(&mut self, to: RepairState, reason: Option<&str>) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition { from: self.current, to });
        }

        if self.current == RepairState::Retrying && to == RepairState::Generating {
            self.attempt += 1;
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            attempt: self.attempt,
            elapsed_ms: self.started_at.elapsed().as_millis() as u64,
            reason: reason.map(str::to_string),
        };

        tracing::debug!(
            from = %record.from,
            to = %record.to,
            attempt = record.attempt,
            reason = record.reason.as_deref().unwrap_or(""),
            "repair transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }
}
