//! Prompt Renderer - Render the built-in templates with Handlebars
//!
//! Each template is registered once under a fixed name; the typed methods
//! build the context and render it.

use handlebars::Handlebars;
use serde::Serialize;

use crate::classify::FailureKind;
use crate::error::{ManimatorError, Result};
use crate::prompt::templates;
use crate::render::{QualityPreset, SCENE_CLASS};

const SYSTEM: &str = "system";
const INITIAL: &str = "initial";
const FOLLOWUP: &str = "followup";
const CORRECTION: &str = "correction";

#[derive(Serialize)]
struct SystemContext<'a> {
    scene: &'a str,
    quality: String,
    quality_hint: &'a str,
}

#[derive(Serialize)]
struct InitialContext<'a> {
    scene: &'a str,
    description: &'a str,
}

#[derive(Serialize)]
struct FollowupContext<'a> {
    scene: &'a str,
    code: &'a str,
    change: &'a str,
}

#[derive(Serialize)]
struct CorrectionContext<'a> {
    scene: &'a str,
    code: &'a str,
    kind: &'a str,
    excerpt: &'a str,
    hint: &'a str,
    request: Option<&'a str>,
}

/// Renders the generation prompts
pub struct PromptRenderer {
    handlebars: Handlebars<'static>,
}

impl PromptRenderer {
    /// Create a renderer with every built-in template registered
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // Code must reach the model verbatim
        handlebars.register_escape_fn(handlebars::no_escape);

        for (name, template) in [
            (SYSTEM, templates::SYSTEM),
            (INITIAL, templates::INITIAL),
            (FOLLOWUP, templates::FOLLOWUP),
            (CORRECTION, templates::CORRECTION),
        ] {
            handlebars
                .register_template_string(name, template)
                .map_err(|e| ManimatorError::Template(format!("Failed to register template '{}': {}", name, e)))?;
        }

        Ok(Self { handlebars })
    }

    fn render<T: Serialize>(&self, name: &str, context: &T) -> Result<String> {
        self.handlebars
            .render(name, context)
            .map_err(|e| ManimatorError::Template(format!("Failed to render template '{}': {}", name, e)))
    }

    /// System prompt for every request at the given quality
    pub fn system(&self, quality: QualityPreset) -> Result<String> {
        self.render(
            SYSTEM,
            &SystemContext {
                scene: SCENE_CLASS,
                quality: quality.as_str().to_uppercase(),
                quality_hint: templates::quality_hint(quality),
            },
        )
    }

    /// First request for a new animation
    pub fn initial(&self, description: &str) -> Result<String> {
        self.render(
            INITIAL,
            &InitialContext {
                scene: SCENE_CLASS,
                description,
            },
        )
    }

    /// Change request against working code
    pub fn followup(&self, code: &str, change: &str) -> Result<String> {
        self.render(
            FOLLOWUP,
            &FollowupContext {
                scene: SCENE_CLASS,
                code,
                change,
            },
        )
    }

    /// Repair request carrying the failing code and the classified diagnostic.
    ///
    /// `request` restates what the user asked for, so a repair does not drift
    /// away from the original prompt.
    pub fn correction(
        &self,
        code: &str,
        kind: FailureKind,
        excerpt: &str,
        hint: &str,
        request: Option<&str>,
    ) -> Result<String> {
        self.render(
            CORRECTION,
            &CorrectionContext {
                scene: SCENE_CLASS,
                code,
                kind: kind.label(),
                excerpt,
                hint,
                request,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn renderer() -> PromptRenderer {
        PromptRenderer::new().unwrap()
    }

    #[test]
    fn test_system_prompt_names_scene_and_quality() {
        let prompt = renderer().system(QualityPreset::High).unwrap();
        assert!(prompt.contains("class GeneratedScene(Scene)"));
        assert!(prompt.contains("## Quality target: HIGH"));
        assert!(prompt.contains(templates::quality_hint(QualityPreset::High)));
    }

    #[test]
    fn test_initial_prompt() {
        let prompt = renderer().initial("a blue circle that morphs into a red square").unwrap();
        assert!(prompt.starts_with("Create a Manim animation that: a blue circle"));
        assert!(prompt.contains("GeneratedScene"));
    }

    #[test]
    fn test_followup_keeps_code_verbatim() {
        let code = "if a < b and c > d:\n    x = \"<tag>\" & 1";
        let prompt = renderer().followup(code, "make it red").unwrap();
        assert!(prompt.contains(code));
        assert!(prompt.contains("## Requested change\nmake it red"));
    }

    #[test]
    fn test_correction_prompt_carries_feedback() {
        let prompt = renderer()
            .correction(
                "Circle(",
                FailureKind::SyntaxError,
                "SyntaxError: unexpected EOF",
                "correct the syntax error",
                None,
            )
            .unwrap();
        assert!(prompt.contains("failed to render (syntax error)"));
        assert!(prompt.contains("SyntaxError: unexpected EOF"));
        assert!(prompt.contains("## What to fix\ncorrect the syntax error"));
        assert!(!prompt.contains("original request"));
    }

    #[test]
    fn test_correction_prompt_restates_request() {
        let prompt = renderer()
            .correction("x", FailureKind::UndefinedSymbol, "NameError", "define it", Some("a circle"))
            .unwrap();
        assert!(prompt.contains("The animation must still satisfy the original request: a circle"));
    }

    #[test]
    fn test_every_quality_has_a_hint() {
        for quality in QualityPreset::ALL {
            assert!(!templates::quality_hint(quality).is_empty());
        }
    }
}
