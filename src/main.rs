use clap::{CommandFactory, Parser};
use colored::*;
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

mod cli;

use cli::Cli;
use cli::commands::{Commands, ConfigArgs, RunArgs};
use cli::display;
use manimator::config::Config;
use manimator::generator::Prompt;
use manimator::llm::{ProviderKind, build_listing_backend, ollama};
use manimator::preview::open_video;
use manimator::repair::{RepairLoop, RepairReport};
use manimator::session::SessionState;

const QUIT_WORDS: [&str; 4] = ["done", "quit", "exit", "q"];

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("manimator")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("manimator.log");

    // Setup env_logger with file output
    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

async fn run_application(cli: &Cli, config: Config) -> Result<ExitCode> {
    info!("Starting application");

    match &cli.command {
        None => {
            Cli::command().print_help()?;
            println!();
            Ok(ExitCode::SUCCESS)
        }
        Some(Commands::Create { description, run }) => handle_create(description, run, cli, config).await,
        Some(Commands::Chat { run }) => handle_chat(run, cli, config).await,
        Some(Commands::Config(args)) => handle_config(args, cli, config),
        Some(Commands::ListModels { provider }) => handle_list_models(*provider, &config).await,
    }
}

fn maybe_preview(config: &Config, report: &RepairReport) {
    if !config.auto_preview {
        return;
    }
    if let Some(path) = report.video_path() {
        if let Err(e) = open_video(path) {
            log::warn!("Preview failed: {}", e);
            println!("{} could not open {}: {}", "Warning:".yellow(), path.display(), e);
        }
    }
}

async fn handle_create(description: &str, run: &RunArgs, cli: &Cli, config: Config) -> Result<ExitCode> {
    let config = config.with_overrides(&run.overrides(cli.is_verbose()))?;
    info!("Create: '{}' with {} at {}", description, config.provider, config.default_quality);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let repair = RepairLoop::from_config(&config)
        .context("Failed to set up the LLM provider")?
        .with_events(tx);

    let mut state = SessionState::begin();
    let report = display::run_with_progress(&repair, &mut rx, &mut state, Prompt::new(description), config.verbose).await?;

    match report.failure() {
        None => {
            maybe_preview(&config, &report);
            Ok(ExitCode::SUCCESS)
        }
        Some(failure) => {
            display::print_failure(failure);
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Next non-empty line from stdin; `None` at end of input
async fn read_prompt<R>(lines: &mut tokio::io::Lines<R>, label: &str) -> Result<Option<String>>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    loop {
        print!("{} ", label.bold());
        std::io::stdout().flush()?;
        match lines.next_line().await? {
            None => return Ok(None),
            Some(line) => {
                let text = line.trim();
                if !text.is_empty() {
                    return Ok(Some(text.to_string()));
                }
            }
        }
    }
}

fn is_quit(text: &str) -> bool {
    QUIT_WORDS.contains(&text.to_lowercase().as_str())
}

async fn handle_chat(run: &RunArgs, cli: &Cli, config: Config) -> Result<ExitCode> {
    let config = config.with_overrides(&run.overrides(cli.is_verbose()))?;
    info!("Chat session with {} at {}", config.provider, config.default_quality);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let repair = RepairLoop::from_config(&config)
        .context("Failed to set up the LLM provider")?
        .with_events(tx);

    println!("{}", "Describe an animation. Follow up with changes; type 'done' to finish.".cyan());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut state = SessionState::begin();

    let first = match read_prompt(&mut lines, "describe>").await? {
        Some(text) if !is_quit(&text) => text,
        _ => return Ok(ExitCode::SUCCESS),
    };

    let report = display::run_with_progress(&repair, &mut rx, &mut state, Prompt::new(first), config.verbose).await?;
    if let Some(failure) = report.failure() {
        display::print_failure(failure);
        return Ok(ExitCode::FAILURE);
    }
    maybe_preview(&config, &report);

    while let Some(text) = read_prompt(&mut lines, "change>").await? {
        if is_quit(&text) {
            break;
        }

        let prompt = match state.last_code() {
            Some(code) => Prompt::new(text).with_prior_code(code),
            None => Prompt::new(text),
        };
        let report = display::run_with_progress(&repair, &mut rx, &mut state, prompt, config.verbose).await?;
        match report.failure() {
            None => maybe_preview(&config, &report),
            Some(failure) => {
                display::print_failure(failure);
                println!("{}", "The previous version is unchanged.".yellow());
            }
        }
    }

    display::print_session_summary(&state);
    Ok(ExitCode::SUCCESS)
}

fn handle_config(args: &ConfigArgs, cli: &Cli, mut config: Config) -> Result<ExitCode> {
    if args.is_empty() {
        let path = cli.config.clone().or_else(Config::user_config_path);
        display::print_config(&config, path.as_deref());
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(provider) = args.provider {
        if provider != config.provider {
            config.model = None;
        }
        config.provider = provider;
    }
    if let Some(key) = &args.key {
        config.set_api_key(config.provider, key.trim());
    }
    if let Some(model) = &args.model {
        config.model = Some(model.clone());
    }
    if let Some(dir) = &args.output {
        config.output_dir = dir.clone();
    }
    if let Some(attempts) = args.attempts {
        config.max_attempts = attempts;
    }
    if let Some(quality) = args.quality {
        config.default_quality = quality;
    }
    if let Some(auto_preview) = args.auto_preview {
        config.auto_preview = auto_preview;
    }

    let path = config.save(cli.config.as_ref())?;
    println!("{} {}", "Saved".green(), path.display());
    if args.show {
        display::print_config(&config, Some(&path));
    }
    Ok(ExitCode::SUCCESS)
}

async fn handle_list_models(provider: Option<ProviderKind>, config: &Config) -> Result<ExitCode> {
    let kinds = match provider {
        Some(kind) => vec![kind],
        None => ProviderKind::ALL.to_vec(),
    };

    for kind in kinds {
        let backend = build_listing_backend(config, kind)?;
        match backend.list_models().await {
            Ok(models) => display::print_models(kind, &models),
            Err(e) => {
                log::warn!("Listing models for {} failed: {}", kind, e);
                println!("{} {}: {}", "Warning:".yellow(), kind, e);
                if kind == ProviderKind::Ollama {
                    display::print_models(kind, &ollama::recommended());
                }
            }
        }
        println!();
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup logging first
    setup_logging(cli.is_verbose()).context("Failed to setup logging")?;

    // Load configuration
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    info!("Starting with config from: {:?}", cli.config);

    // Run the main application logic
    run_application(&cli, config).await.context("Application failed")
}
