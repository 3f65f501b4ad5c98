//! The generate → render → classify loop.
//!
//! One `run()` processes one request to completion. The `&mut SessionState`
//! borrow keeps a session to a single in-flight request; the session is only
//! touched when a render succeeds.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;

use crate::classify::{FailureKind, classify, environment_problem, excerpt};
use crate::config::Config;
use crate::error::{ManimatorError, Result};
use crate::generator::{CodeGenerator, Feedback, GenerationRequest, Prompt};
use crate::llm::build_backend;
use crate::render::{ManimRenderer, OutputTarget, QualityPreset, RenderOutcome, Renderer};
use crate::repair::outcome::{RepairEvent, RepairFailure, RepairOutcome, RepairReport};
use crate::repair::state::{RepairMachine, RepairState};
use crate::session::SessionState;
use crate::session::naming::next_free_version;

/// Default attempt budget per request
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct RepairConfig {
    /// Generator calls allowed per request
    pub max_attempts: u32,
    pub quality: QualityPreset,
    pub output_dir: PathBuf,
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            quality: QualityPreset::default(),
            output_dir: PathBuf::from("."),
        }
    }
}

impl RepairConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts,
            quality: config.default_quality,
            output_dir: config.output_dir.clone(),
        }
    }
}

pub struct RepairLoop<R: Renderer> {
    generator: CodeGenerator,
    renderer: Arc<R>,
    config: RepairConfig,
    events: Option<UnboundedSender<RepairEvent>>,
}

impl RepairLoop<ManimRenderer> {
    /// Wire the configured provider and the Manim CLI together
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = build_backend(config)?;
        let generator = CodeGenerator::new(Arc::from(backend))?.with_timeout(Duration::from_millis(config.llm.timeout_ms));
        let renderer = Arc::new(ManimRenderer::from_config(&config.render));
        Ok(Self::new(generator, renderer, RepairConfig::from_config(config)))
    }
}

impl<R: Renderer> RepairLoop<R> {
    pub fn new(generator: CodeGenerator, renderer: Arc<R>, config: RepairConfig) -> Self {
        Self {
            generator,
            renderer,
            config,
            events: None,
        }
    }

    /// Stream progress events to `sender`
    pub fn with_events(mut self, sender: UnboundedSender<RepairEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn config(&self) -> &RepairConfig {
        &self.config
    }

    pub fn generator(&self) -> &CodeGenerator {
        &self.generator
    }

    fn emit(&self, event: RepairEvent) {
        if let Some(sender) = &self.events {
            // nobody listening is fine
            let _ = sender.send(event);
        }
    }

    fn exhaust(&self, mut machine: RepairMachine, failure: RepairFailure) -> Result<RepairReport> {
        let reason = failure.to_string();
        log::warn!("Repair exhausted: {}", reason);
        machine.advance(RepairState::Exhausted, Some(&reason))?;
        self.emit(RepairEvent::Exhausted { reason });
        Ok(RepairReport {
            outcome: RepairOutcome::Exhausted(failure),
            attempts: machine.attempt(),
            transitions: machine.into_transitions(),
        })
    }

    /// Whether a failure of `kind` at `attempt` earns another attempt
    fn should_retry(&self, kind: FailureKind, attempt: u32, unknown_retried: bool) -> bool {
        if attempt >= self.config.max_attempts {
            return false;
        }
        match kind {
            FailureKind::Timeout => false,
            FailureKind::Unknown => !unknown_retried,
            _ => kind.is_auto_fixable(),
        }
    }

    /// Run one request to `Done` or `Exhausted`.
    ///
    /// Infrastructure failures (provider down, engine missing, render host
    /// broken) end the run without retrying. Returns `Err` only for invalid
    /// input or internal faults such as a broken template.
    pub async fn run(&self, state: &mut SessionState, prompt: Prompt) -> Result<RepairReport> {
        if prompt.is_empty() {
            return Err(ManimatorError::InvalidInput("prompt is empty".to_string()));
        }
        if self.config.max_attempts == 0 {
            return Err(ManimatorError::InvalidInput("max_attempts must be at least 1".to_string()));
        }

        let quality = self.config.quality;
        let output_dir = self.config.output_dir.as_path();
        let slug = state.slug_for(&prompt.text).to_string();
        // a starting point only; the renderer claims the final name when it writes
        let first_version = next_free_version(output_dir, &slug, state.current_version());
        let target = OutputTarget::new(output_dir, slug, first_version);

        log::info!(
            "Repair run for '{}' -> {} (max {} attempts)",
            prompt.text,
            target.preferred_path().display(),
            self.config.max_attempts
        );

        let mut machine = RepairMachine::new();
        let mut request = GenerationRequest::initial(prompt.clone());
        let mut unknown_retried = false;

        loop {
            let attempt = machine.attempt();
            self.emit(RepairEvent::Generating {
                attempt,
                max_attempts: self.config.max_attempts,
            });

            let artifact = match self.generator.generate(&request, quality).await {
                Ok(artifact) => artifact,
                Err(ManimatorError::Provider(e)) => return self.exhaust(machine, RepairFailure::Provider(e)),
                Err(e) => return Err(e),
            };
            self.emit(RepairEvent::Generated {
                attempt,
                code: artifact.code.clone(),
            });

            machine.advance(RepairState::Rendering, None)?;
            self.emit(RepairEvent::Rendering { attempt, quality });

            let outcome = match self.renderer.render(&artifact, quality, &target).await {
                Ok(outcome) => outcome,
                Err(e) => return self.exhaust(machine, RepairFailure::Environment(e.to_string())),
            };

            let diagnostic_text = match outcome {
                RenderOutcome::Success { video_path } => {
                    machine.advance(RepairState::Done, Some(&video_path.display().to_string()))?;
                    let version = state.record_success(prompt, artifact.clone(), video_path.clone());
                    log::info!("Done on attempt {}: {} (v{})", attempt, video_path.display(), version);
                    self.emit(RepairEvent::Done {
                        video_path: video_path.clone(),
                        version,
                    });
                    return Ok(RepairReport {
                        outcome: RepairOutcome::Done {
                            video_path,
                            version,
                            code: artifact.code,
                        },
                        attempts: attempt,
                        transitions: machine.into_transitions(),
                    });
                }
                RenderOutcome::Failure {
                    exit_code,
                    diagnostic_text,
                } => {
                    let reason = match exit_code {
                        Some(code) => format!("exit code {}", code),
                        None => "no exit code".to_string(),
                    };
                    machine.advance(RepairState::Classifying, Some(&reason))?;
                    diagnostic_text
                }
            };

            if let Some(problem) = environment_problem(&diagnostic_text) {
                return self.exhaust(machine, RepairFailure::Environment(problem));
            }

            let classification = classify(&diagnostic_text);
            let kind = classification.kind;
            let excerpt = excerpt(&diagnostic_text);
            log::info!("Attempt {} failed: {}", attempt, kind);
            self.emit(RepairEvent::RenderFailed {
                attempt,
                kind,
                excerpt: excerpt.clone(),
            });

            if !self.should_retry(kind, attempt, unknown_retried) {
                return self.exhaust(
                    machine,
                    RepairFailure::Exhausted {
                        attempts: attempt,
                        kind,
                        diagnostic: diagnostic_text,
                    },
                );
            }
            if kind == FailureKind::Unknown {
                unknown_retried = true;
            }

            machine.advance(RepairState::Retrying, Some(kind.as_str()))?;
            self.emit(RepairEvent::Retrying {
                next_attempt: attempt + 1,
                hint: classification.hint.clone(),
            });
            request = request.retry(artifact.code, Feedback::new(kind, excerpt, classification.hint));
            machine.advance(RepairState::Generating, None)?;
        }
    }
}
