//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - create: one prompt, one video
//! - chat: a prompt followed by follow-up changes
//! - config: show or change saved settings
//! - list-models: model catalogs per provider

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use manimator::config::Overrides;
use manimator::llm::ProviderKind;
use manimator::render::QualityPreset;

/// Manimator - natural language to mathematical animations
#[derive(Parser, Debug)]
#[command(name = "manimator")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Show generated code and extra detail
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Per-run options shared by `create` and `chat`
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Render quality: low | medium | high | ultra
    #[arg(short, long)]
    pub quality: Option<QualityPreset>,

    /// LLM provider: openai | anthropic | gemini | ollama
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// Model name (overrides the configured model)
    #[arg(long)]
    pub model: Option<String>,

    /// Output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Attempts per request, including the first
    #[arg(short = 'r', long)]
    pub attempts: Option<u32>,

    /// Open the video after rendering
    #[arg(short, long)]
    pub preview: bool,
}

impl RunArgs {
    pub fn overrides(&self, verbose: bool) -> Overrides {
        Overrides {
            provider: self.provider,
            model: self.model.clone(),
            output_dir: self.output.clone(),
            quality: self.quality,
            max_attempts: self.attempts,
            preview: self.preview,
            verbose,
        }
    }
}

/// Settings changed by `manimator config`
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Provider to use by default, and the one `--key` belongs to
    #[arg(long)]
    pub provider: Option<ProviderKind>,

    /// API key for the provider
    #[arg(long)]
    pub key: Option<String>,

    /// Default model
    #[arg(long)]
    pub model: Option<String>,

    /// Default output directory
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Default attempts per request
    #[arg(short = 'r', long)]
    pub attempts: Option<u32>,

    /// Default render quality
    #[arg(short, long)]
    pub quality: Option<QualityPreset>,

    /// Open videos automatically after rendering
    #[arg(long)]
    pub auto_preview: Option<bool>,

    /// Print the current settings
    #[arg(long)]
    pub show: bool,
}

impl ConfigArgs {
    /// True when no setting is being changed
    pub fn is_empty(&self) -> bool {
        self.provider.is_none()
            && self.key.is_none()
            && self.model.is_none()
            && self.output.is_none()
            && self.attempts.is_none()
            && self.quality.is_none()
            && self.auto_preview.is_none()
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate an animation from a description
    Create {
        /// Natural-language description of the animation
        description: String,

        #[command(flatten)]
        run: RunArgs,
    },

    /// Describe an animation, then iterate on it with follow-up changes
    Chat {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Show or change saved settings
    Config(ConfigArgs),

    /// List the models each provider offers
    ListModels {
        /// Only this provider
        #[arg(long)]
        provider: Option<ProviderKind>,
    },
}
