//! Prompt System - the templates sent to the LLM
//!
//! System, initial, follow-up and correction prompts, rendered with Handlebars.

mod render;
mod templates;

pub use render::PromptRenderer;
pub use templates::quality_hint;
