//! Rendering - run candidate code through the animation engine
//!
//! A renderer never judges why a render failed. Content-level failures come
//! back as `RenderOutcome::Failure` with the engine's raw output; only
//! infrastructure problems (no engine, unwritable cache) are errors.

mod manim;
mod quality;

pub use manim::ManimRenderer;
pub use quality::{QualityPreset, QualityProfile};

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::generator::CandidateArtifact;
use crate::session::naming::versioned_file_name;

/// Scene class every generated script defines
pub const SCENE_CLASS: &str = "GeneratedScene";

/// Result of one render attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderOutcome {
    Success { video_path: PathBuf },
    Failure { exit_code: Option<i32>, diagnostic_text: String },
}

impl RenderOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RenderOutcome::Success { .. })
    }
}

/// Where a finished video goes: `<dir>/<slug>_v<N>.mp4` with N starting at
/// `first_version`. The final N is fixed only when the file is created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputTarget {
    pub dir: PathBuf,
    pub slug: String,
    pub first_version: u32,
}

impl OutputTarget {
    pub fn new(dir: impl Into<PathBuf>, slug: impl Into<String>, first_version: u32) -> Self {
        Self {
            dir: dir.into(),
            slug: slug.into(),
            first_version,
        }
    }

    /// Path the video gets when no other writer holds `first_version`
    pub fn preferred_path(&self) -> PathBuf {
        self.dir.join(versioned_file_name(&self.slug, self.first_version))
    }
}

/// Rendering infrastructure failures
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("Rendering engine '{0}' not found: install it with `pip install manim`")]
    EngineMissing(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Turns a candidate into a video file
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `artifact` and, on success, write the video to the first free
    /// version of `target`, never replacing an existing file. The engine
    /// process is reaped on every path, including when the future is dropped.
    async fn render(
        &self,
        artifact: &CandidateArtifact,
        quality: QualityPreset,
        target: &OutputTarget,
    ) -> Result<RenderOutcome, RenderError>;
}

/// One scripted response of a [`ScriptedRenderer`]
#[derive(Debug, Clone)]
pub enum ScriptedRender {
    Succeed,
    Fail(String),
    EngineMissing,
}

/// A single call seen by a [`ScriptedRenderer`]
#[derive(Debug, Clone)]
pub struct RenderCall {
    pub code: String,
    pub quality: QualityPreset,
    pub output_path: PathBuf,
}

/// Renderer that replays scripted outcomes without running an engine.
///
/// Succeeds with the target's preferred path and does not touch the filesystem.
/// Once the script runs out every call reports the engine missing.
pub struct ScriptedRenderer {
    script: Mutex<VecDeque<ScriptedRender>>,
    calls: Mutex<Vec<RenderCall>>,
}

impl ScriptedRenderer {
    pub fn new(script: Vec<ScriptedRender>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Renderer whose every scripted call succeeds
    pub fn succeeding(times: usize) -> Self {
        Self::new(vec![ScriptedRender::Succeed; times])
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn render(
        &self,
        artifact: &CandidateArtifact,
        quality: QualityPreset,
        target: &OutputTarget,
    ) -> Result<RenderOutcome, RenderError> {
        let output_path = target.preferred_path();
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(RenderCall {
            code: artifact.code.clone(),
            quality,
            output_path: output_path.clone(),
        });

        let next = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(ScriptedRender::Succeed) => Ok(RenderOutcome::Success { video_path: output_path }),
            Some(ScriptedRender::Fail(diagnostic_text)) => Ok(RenderOutcome::Failure {
                exit_code: Some(1),
                diagnostic_text,
            }),
            Some(ScriptedRender::EngineMissing) | None => Err(RenderError::EngineMissing("scripted".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_renderer_replays_in_order() {
        let renderer = ScriptedRenderer::new(vec![
            ScriptedRender::Fail("NameError: x".to_string()),
            ScriptedRender::Succeed,
        ]);
        let artifact = CandidateArtifact::new("code", 1);
        let target = OutputTarget::new("/videos", "circle", 1);

        let first = renderer
            .render(&artifact, QualityPreset::Low, &target)
            .await
            .unwrap();
        assert_eq!(
            first,
            RenderOutcome::Failure {
                exit_code: Some(1),
                diagnostic_text: "NameError: x".to_string()
            }
        );

        let second = renderer
            .render(&artifact, QualityPreset::Low, &target)
            .await
            .unwrap();
        assert_eq!(
            second,
            RenderOutcome::Success {
                video_path: PathBuf::from("/videos/circle_v1.mp4")
            }
        );

        let calls = renderer.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].quality, QualityPreset::Low);
        assert_eq!(calls[0].code, "code");
    }

    #[tokio::test]
    async fn test_scripted_renderer_exhausted() {
        let renderer = ScriptedRenderer::new(vec![]);
        let artifact = CandidateArtifact::new("code", 1);
        let result = renderer
            .render(&artifact, QualityPreset::Medium, &OutputTarget::new(".", "a", 1))
            .await;
        assert!(matches!(result, Err(RenderError::EngineMissing(_))));
    }

    #[test]
    fn test_output_target_preferred_path() {
        let target = OutputTarget::new("/videos", "spinning_circle", 3);
        assert_eq!(target.preferred_path(), PathBuf::from("/videos/spinning_circle_v3.mp4"));
    }

    #[test]
    fn test_outcome_is_success() {
        assert!(
            RenderOutcome::Success {
                video_path: PathBuf::from("a.mp4")
            }
            .is_success()
        );
        assert!(
            !RenderOutcome::Failure {
                exit_code: None,
                diagnostic_text: String::new()
            }
            .is_success()
        );
    }
}
