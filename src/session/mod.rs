//! Session state - context carried across the turns of one create or chat
//!
//! A session keeps only successful turns. The version counter starts at 1,
//! names the next artifact, and moves forward by exactly one per success.

pub mod naming;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::generator::{CandidateArtifact, Prompt};

/// One successful turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub prompt: Prompt,
    pub artifact: CandidateArtifact,
    pub version: u32,
    pub video_path: PathBuf,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    history: Vec<HistoryEntry>,
    version: u32,
    slug: Option<String>,
    started_at: DateTime<Utc>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::begin()
    }
}

impl SessionState {
    /// Fresh session at version 1 with no history
    pub fn begin() -> Self {
        Self {
            history: Vec::new(),
            version: 1,
            slug: None,
            started_at: Utc::now(),
        }
    }

    /// Version the next successful artifact receives
    pub fn current_version(&self) -> u32 {
        self.version
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Code of the latest successful turn, the base for follow-ups
    pub fn last_code(&self) -> Option<&str> {
        self.history.last().map(|e| e.artifact.code.as_str())
    }

    pub fn videos(&self) -> impl Iterator<Item = &Path> {
        self.history.iter().map(|e| e.video_path.as_path())
    }

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    /// The session's file slug, derived from the first description it sees
    pub fn slug_for(&mut self, description: &str) -> &str {
        self.slug
            .get_or_insert_with(|| naming::slug_from_description(description))
            .as_str()
    }

    /// Append a successful turn and advance the version. Returns the version
    /// the artifact was recorded under.
    pub fn record_success(&mut self, prompt: Prompt, artifact: CandidateArtifact, video_path: PathBuf) -> u32 {
        let version = self.version;
        self.history.push(HistoryEntry {
            prompt,
            artifact,
            version,
            video_path,
            recorded_at: Utc::now(),
        });
        self.version += 1;
        tracing::debug!(version, next = self.version, "session recorded success");
        version
    }
}
