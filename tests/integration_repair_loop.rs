//! Repair loop integration tests
//!
//! Drives full requests through the public API with a scripted LLM backend
//! and either a scripted renderer or a fake engine script.

use std::path::PathBuf;
use std::sync::Arc;

use manimator::classify::{FailureKind, classify, timeout_diagnostic};
use manimator::error::Result;
use manimator::generator::{CodeGenerator, Prompt};
use manimator::llm::MockBackend;
use manimator::render::{ManimRenderer, QualityPreset, ScriptedRender, ScriptedRenderer};
use manimator::repair::{RepairConfig, RepairFailure, RepairLoop, RepairOutcome, RepairState};
use manimator::session::SessionState;
use manimator::session::naming::{slug_from_description, versioned_file_name};
use tempfile::TempDir;

const CIRCLE_TO_SQUARE: &str = r#"from manim import *

class GeneratedScene(Scene):
    def construct(self):
        circle = Circle(color=BLUE)
        square = Square(color=RED)
        self.play(Create(circle))
        self.play(Transform(circle, square))
        self.wait(1)
"#;

const TYPO: &str = r#"from manim import *

class GeneratedScene(Scene):
    def construct(self):
        self.play(Create(Circel()))
        self.wait(1)
"#;

const RED_WITH_BOUNCE: &str = r#"from manim import *

class GeneratedScene(Scene):
    def construct(self):
        circle = Circle(color=RED)
        square = Square(side_length=0.5).shift(UP * 2)
        self.play(Create(circle), FadeIn(square))
        self.play(square.animate.shift(DOWN * 2), rate_func=there_and_back)
        self.wait(1)
"#;

const NAME_ERROR: &str = "Traceback (most recent call last):\n  File \"scene.py\", line 5, in construct\nNameError: name 'Circel' is not defined";

const SYNTAX_ERROR: &str = "  File \"scene.py\", line 4\n    self.play(Create(circle)\n                            ^\nSyntaxError: '(' was never closed";

fn repair_loop(
    backend: Arc<MockBackend>,
    renderer: Arc<ScriptedRenderer>,
    max_attempts: u32,
    output_dir: PathBuf,
) -> RepairLoop<ScriptedRenderer> {
    let generator = CodeGenerator::new(backend).unwrap();
    let config = RepairConfig {
        max_attempts,
        quality: QualityPreset::Medium,
        output_dir,
    };
    RepairLoop::new(generator, renderer, config)
}

/// Integration test: valid code renders on the first attempt
#[tokio::test]
async fn test_first_attempt_success() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(MockBackend::new(vec![CIRCLE_TO_SQUARE]));
    let renderer = Arc::new(ScriptedRenderer::succeeding(1));
    let mut state = SessionState::begin();

    let report = repair_loop(backend.clone(), renderer.clone(), 3, temp_dir.path().to_path_buf())
        .run(&mut state, Prompt::new("a blue circle that morphs into a red square"))
        .await?;

    match &report.outcome {
        RepairOutcome::Done { version, code, video_path } => {
            assert_eq!(*version, 1);
            assert!(code.contains("class GeneratedScene"));
            assert!(video_path.starts_with(temp_dir.path()));
        }
        other => panic!("Expected Done, got {:?}", other),
    }
    assert_eq!(report.attempts, 1);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(renderer.call_count(), 1);
    assert_eq!(renderer.calls()[0].quality, QualityPreset::Medium);
    assert_eq!(state.current_version(), 2);
    assert_eq!(state.history().len(), 1);

    let states: Vec<RepairState> = report.transitions.iter().map(|t| t.to).collect();
    assert_eq!(states, vec![RepairState::Rendering, RepairState::Done]);
    Ok(())
}

/// Integration test: an undefined name is fed back and fixed on attempt 2
#[tokio::test]
async fn test_undefined_symbol_repaired() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(MockBackend::new(vec![TYPO, CIRCLE_TO_SQUARE]));
    let renderer = Arc::new(ScriptedRenderer::new(vec![
        ScriptedRender::Fail(NAME_ERROR.to_string()),
        ScriptedRender::Succeed,
    ]));
    let mut state = SessionState::begin();

    let report = repair_loop(backend.clone(), renderer.clone(), 3, temp_dir.path().to_path_buf())
        .run(&mut state, Prompt::new("a blue circle that morphs into a red square"))
        .await?;

    assert!(report.is_done());
    assert_eq!(report.attempts, 2);
    assert!(matches!(report.outcome, RepairOutcome::Done { version: 1, .. }));

    let requests = backend.requests();
    assert_eq!(requests.len(), 2);
    let correction = requests[1].last_user_text().unwrap();
    let hint = classify(NAME_ERROR).hint;
    assert!(correction.contains(&hint));
    assert!(correction.contains("is not defined"));
    assert!(correction.contains("Circel()"));

    // both attempts render to the same versioned file
    let calls = renderer.calls();
    assert_eq!(calls[0].output_path, calls[1].output_path);
    assert_eq!(calls[1].code, CIRCLE_TO_SQUARE.trim_end());
    Ok(())
}

/// Integration test: the budget runs out on repeated syntax errors
#[tokio::test]
async fn test_syntax_errors_exhaust_budget() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(MockBackend::new(vec![TYPO, TYPO, TYPO, TYPO]));
    let final_diagnostic = format!("{}\n(attempt 3)", SYNTAX_ERROR);
    let renderer = Arc::new(ScriptedRenderer::new(vec![
        ScriptedRender::Fail(SYNTAX_ERROR.to_string()),
        ScriptedRender::Fail(SYNTAX_ERROR.to_string()),
        ScriptedRender::Fail(final_diagnostic.clone()),
    ]));
    let mut state = SessionState::begin();

    let report = repair_loop(backend.clone(), renderer, 3, temp_dir.path().to_path_buf())
        .run(&mut state, Prompt::new("a blue circle that morphs into a red square"))
        .await?;

    match report.failure() {
        Some(RepairFailure::Exhausted {
            attempts,
            kind,
            diagnostic,
        }) => {
            assert_eq!(*attempts, 3);
            assert_eq!(*kind, FailureKind::SyntaxError);
            assert_eq!(diagnostic, &final_diagnostic);
        }
        other => panic!("Expected exhausted on syntax errors, got {:?}", other),
    }
    assert_eq!(backend.call_count(), 3);
    assert_eq!(report.transitions.last().unwrap().to, RepairState::Exhausted);

    // a failed request leaves the session untouched
    assert_eq!(state.current_version(), 1);
    assert!(state.is_empty());
    Ok(())
}

/// Integration test: a render timeout is never retried
#[tokio::test]
async fn test_timeout_is_terminal() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(MockBackend::new(vec![CIRCLE_TO_SQUARE, CIRCLE_TO_SQUARE]));
    let diagnostic = timeout_diagnostic(std::time::Duration::from_secs(300), "Animation 0: Create(Circle)");
    let renderer = Arc::new(ScriptedRenderer::new(vec![
        ScriptedRender::Fail(diagnostic),
        ScriptedRender::Succeed,
    ]));
    let mut state = SessionState::begin();

    let report = repair_loop(backend.clone(), renderer.clone(), 3, temp_dir.path().to_path_buf())
        .run(&mut state, Prompt::new("a blue circle that morphs into a red square"))
        .await?;

    assert_eq!(report.failure().and_then(|f| f.kind()), Some(FailureKind::Timeout));
    assert_eq!(report.attempts, 1);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(renderer.call_count(), 1);
    Ok(())
}

/// Integration test: a chat follow-up builds on the stored code
#[tokio::test]
async fn test_followup_advances_version() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(MockBackend::new(vec![CIRCLE_TO_SQUARE, RED_WITH_BOUNCE]));
    let renderer = Arc::new(ScriptedRenderer::succeeding(2));
    let repair = repair_loop(backend.clone(), renderer.clone(), 3, temp_dir.path().to_path_buf());
    let mut state = SessionState::begin();

    let first = repair
        .run(&mut state, Prompt::new("a blue circle that morphs into a red square"))
        .await?;
    assert!(first.is_done());
    assert_eq!(state.current_version(), 2);

    let stored = state.last_code().unwrap().to_string();
    let followup = Prompt::new("make it red and add a bouncing square").with_prior_code(stored.clone());
    let second = repair.run(&mut state, followup).await?;

    assert!(matches!(second.outcome, RepairOutcome::Done { version: 2, .. }));
    assert_eq!(state.current_version(), 3);
    assert_eq!(state.history().len(), 2);
    assert_eq!(state.history()[1].prompt.prior_code.as_deref(), Some(stored.as_str()));

    let followup_request = backend.requests()[1].last_user_text().unwrap().to_string();
    assert!(followup_request.contains(&stored));
    assert!(followup_request.contains("make it red and add a bouncing square"));

    let slug = slug_from_description("a blue circle that morphs into a red square");
    let calls = renderer.calls();
    assert_eq!(calls[0].output_path, temp_dir.path().join(versioned_file_name(&slug, 1)));
    assert_eq!(calls[1].output_path, temp_dir.path().join(versioned_file_name(&slug, 2)));
    Ok(())
}

/// Integration test: a failed follow-up keeps the previous version current
#[tokio::test]
async fn test_failed_followup_leaves_session_unchanged() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let backend = Arc::new(MockBackend::new(vec![CIRCLE_TO_SQUARE, TYPO]));
    let renderer = Arc::new(ScriptedRenderer::new(vec![
        ScriptedRender::Succeed,
        ScriptedRender::Fail(SYNTAX_ERROR.to_string()),
    ]));
    let repair = repair_loop(backend, renderer, 1, temp_dir.path().to_path_buf());
    let mut state = SessionState::begin();

    repair.run(&mut state, Prompt::new("a circle")).await?;
    let before = state.last_code().unwrap().to_string();

    let report = repair
        .run(&mut state, Prompt::new("add a triangle").with_prior_code(before.clone()))
        .await?;

    assert!(!report.is_done());
    assert_eq!(state.current_version(), 2);
    assert_eq!(state.history().len(), 1);
    assert_eq!(state.last_code(), Some(before.as_str()));
    Ok(())
}

/// Integration test: existing videos are never overwritten
#[tokio::test]
async fn test_existing_video_is_skipped() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let slug = slug_from_description("a spinning square");
    std::fs::write(temp_dir.path().join(versioned_file_name(&slug, 1)), b"old")?;

    let backend = Arc::new(MockBackend::new(vec![CIRCLE_TO_SQUARE]));
    let renderer = Arc::new(ScriptedRenderer::succeeding(1));
    let mut state = SessionState::begin();

    let report = repair_loop(backend, renderer.clone(), 3, temp_dir.path().to_path_buf())
        .run(&mut state, Prompt::new("a spinning square"))
        .await?;

    assert_eq!(
        renderer.calls()[0].output_path,
        temp_dir.path().join(versioned_file_name(&slug, 2))
    );
    // the session's own counter still starts at 1
    assert!(matches!(report.outcome, RepairOutcome::Done { version: 1, .. }));
    Ok(())
}

/// Integration test: attempts never exceed the configured budget
#[tokio::test]
async fn test_attempts_bounded_by_budget() -> Result<()> {
    for budget in 1..=4u32 {
        let temp_dir = TempDir::new()?;
        let backend = Arc::new(MockBackend::new(vec![TYPO; 6]));
        let renderer = Arc::new(ScriptedRenderer::new(
            (0..6)
                .map(|_| ScriptedRender::Fail(NAME_ERROR.to_string()))
                .collect(),
        ));
        let mut state = SessionState::begin();

        let report = repair_loop(backend.clone(), renderer, budget, temp_dir.path().to_path_buf())
            .run(&mut state, Prompt::new("a circle"))
            .await?;

        assert_eq!(report.attempts, budget);
        assert_eq!(backend.call_count() as u32, budget);
        assert_eq!(report.failure().and_then(|f| f.kind()), Some(FailureKind::UndefinedSymbol));
    }
    Ok(())
}

/// Write a shell script standing in for `manim`: it sleeps, then "renders"
/// the scene by copying the script into the expected video location
#[cfg(unix)]
fn slow_fake_engine(dir: &std::path::Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-manim");
    let body = r#"#!/bin/sh
sleep 0.5
stem=$(basename "$6" .py)
out="$5/videos/$stem/720p30"
mkdir -p "$out"
cat "$6" > "$out/GeneratedScene.mp4"
"#;
    std::fs::write(&path, body).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Integration test: two sessions rendering into one directory keep their own videos
#[cfg(unix)]
#[tokio::test]
async fn test_concurrent_sessions_share_output_dir() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let engine = slow_fake_engine(temp_dir.path());
    let output_dir = temp_dir.path().join("videos");
    let cache_dir = temp_dir.path().join("cache");

    let session_loop = |code: &str| {
        let generator = CodeGenerator::new(Arc::new(MockBackend::new(vec![code.to_string()]))).unwrap();
        let renderer = Arc::new(ManimRenderer::new(
            engine.to_string_lossy(),
            cache_dir.clone(),
            std::time::Duration::from_secs(10),
        ));
        let config = RepairConfig {
            max_attempts: 1,
            quality: QualityPreset::Medium,
            output_dir: output_dir.clone(),
        };
        RepairLoop::new(generator, renderer, config)
    };
    let loop_a = session_loop("# SESSION_A");
    let loop_b = session_loop("# SESSION_B");
    let mut state_a = SessionState::begin();
    let mut state_b = SessionState::begin();

    let (a, b) = tokio::join!(
        loop_a.run(&mut state_a, Prompt::new("a circle")),
        loop_b.run(&mut state_b, Prompt::new("a circle")),
    );
    let (a, b) = (a?, b?);

    let video_a = a.video_path().unwrap().clone();
    let video_b = b.video_path().unwrap().clone();
    assert_ne!(video_a, video_b);
    assert_eq!(std::fs::read_to_string(&video_a)?, "# SESSION_A");
    assert_eq!(std::fs::read_to_string(&video_b)?, "# SESSION_B");

    // each session still counts its own versions from 1
    assert_eq!(state_a.history()[0].version, 1);
    assert_eq!(state_b.history()[0].version, 1);
    assert_eq!(state_a.history()[0].video_path, video_a);
    Ok(())
}
