//! Manimator - natural language to Manim animations
//!
//! An LLM writes Manim scene code, the Manim CLI renders it, and failed
//! renders are classified and fed back for another attempt until a video
//! comes out or the attempt budget is spent.

pub mod classify;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod preview;
pub mod prompt;
pub mod render;
pub mod repair;
pub mod session;

pub use error::{ManimatorError, Result};
