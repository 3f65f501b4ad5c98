//! Terminal output for the CLI: live repair progress, failure reports and
//! summary tables.

use colored::*;
use tokio::sync::mpsc::UnboundedReceiver;

use manimator::classify::excerpt;
use manimator::config::Config;
use manimator::generator::Prompt;
use manimator::llm::{ModelInfo, ProviderKind};
use manimator::render::Renderer;
use manimator::repair::{RepairEvent, RepairFailure, RepairLoop, RepairReport};
use manimator::session::SessionState;

/// Run one request while printing its events in order
pub async fn run_with_progress<R: Renderer>(
    repair: &RepairLoop<R>,
    events: &mut UnboundedReceiver<RepairEvent>,
    state: &mut SessionState,
    prompt: Prompt,
    verbose: bool,
) -> manimator::Result<RepairReport> {
    let run = repair.run(state, prompt);
    tokio::pin!(run);

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => print_event(&event, verbose),
            result = &mut run => break result,
        }
    };

    while let Ok(event) = events.try_recv() {
        print_event(&event, verbose);
    }
    result
}

pub fn print_event(event: &RepairEvent, verbose: bool) {
    match event {
        RepairEvent::Generating { attempt, max_attempts } => {
            println!("{} Generating scene code...", format!("[{}/{}]", attempt, max_attempts).cyan());
        }
        RepairEvent::Generated { code, .. } => {
            if verbose {
                println!("{}", "--- generated code ---".dimmed());
                println!("{}", code.dimmed());
                println!("{}", "----------------------".dimmed());
            }
        }
        RepairEvent::Rendering { quality, .. } => {
            let profile = quality.profile();
            println!(
                "      Rendering at {} ({} @ {}fps)...",
                quality,
                profile.resolution(),
                profile.fps
            );
        }
        RepairEvent::RenderFailed { kind, excerpt, .. } => {
            println!("      {} {}", "✗".red(), format!("Render failed: {}", kind).red());
            if verbose {
                for line in excerpt.lines() {
                    println!("        {}", line.dimmed());
                }
            }
        }
        RepairEvent::Retrying { next_attempt, hint } => {
            println!("      {} attempt {}: {}", "↻ Retrying,".yellow(), next_attempt, hint);
        }
        RepairEvent::Done { video_path, version } => {
            println!("{} v{} saved to {}", "✓".green(), version, video_path.display().to_string().bold());
        }
        RepairEvent::Exhausted { reason } => {
            println!("{} {}", "✗".red(), reason.red());
        }
    }
}

/// Explain a failed request. The reason itself was already printed by the
/// `Exhausted` progress event.
pub fn print_failure(failure: &RepairFailure) {
    for line in failure_details(failure) {
        eprintln!("{}", line);
    }
}

fn failure_details(failure: &RepairFailure) -> Vec<String> {
    let mut lines = Vec::new();
    match failure {
        RepairFailure::Exhausted { diagnostic, .. } => {
            let tail = excerpt(diagnostic);
            if !tail.is_empty() {
                lines.push("Last render output:".yellow().to_string());
                lines.extend(tail.lines().map(|line| format!("  {}", line)));
            }
            lines.push("Try rephrasing the description or simplifying the animation.".to_string());
        }
        RepairFailure::Provider(_) => {
            lines.push("Check the provider settings with `manimator config --show`.".to_string());
        }
        RepairFailure::Environment(_) => {
            lines.push("Check that manim, ffmpeg and LaTeX are installed and on PATH.".to_string());
        }
    }
    lines
}

/// Versions produced in a chat session
pub fn print_session_summary(state: &SessionState) {
    if state.is_empty() {
        println!("{}", "No videos were produced this session.".yellow());
        return;
    }

    println!();
    println!("{}", "Session summary".bold());
    println!("{:<9} {}", "VERSION", "VIDEO");
    for entry in state.history() {
        println!("{:<9} {}", format!("v{}", entry.version), entry.video_path.display());
    }
}

pub fn print_models(kind: ProviderKind, models: &[ModelInfo]) {
    println!("{}", kind.as_str().bold());
    if models.is_empty() {
        println!("  {}", "(no models reported)".dimmed());
        return;
    }
    println!("  {:<32} {:<10} {:<8} {}", "MODEL", "CONTEXT", "SPEED", "DESCRIPTION");
    for model in models {
        println!(
            "  {:<32} {:<10} {:<8} {}",
            model.name, model.context, model.speed, model.description
        );
    }
}

pub fn print_config(config: &Config, path: Option<&std::path::Path>) {
    if let Some(path) = path {
        println!("{} {}", "Config file:".bold(), path.display());
    }
    println!("  provider:        {}", config.provider);
    println!("  model:           {}", config.model_for(config.provider));
    println!("  output dir:      {}", config.output_dir.display());
    println!("  quality:         {}", config.default_quality);
    println!("  max attempts:    {}", config.max_attempts);
    println!("  auto preview:    {}", config.auto_preview);
    println!("  render engine:   {}", config.render.engine);
    println!("  render timeout:  {}ms", config.render.timeout_ms);
    println!("  llm timeout:     {}ms", config.llm.timeout_ms);
    println!("  api keys:");
    for kind in ProviderKind::ALL {
        if kind.requires_api_key() {
            println!("    {:<10} {}", kind.as_str(), config.masked_key(kind));
        }
    }
}
