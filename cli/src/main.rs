//! CLI entrypoint for thinking
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use thinking_application::{NoProgress, Orchestrator, ProgressNotifier};
use thinking_domain::{Language, Model, OutputFormat};
use thinking_infrastructure::{
    ConfigLoader, EnvCredentialStore, FileConfig, HttpBackendGateway, InMemoryConversationStore,
    JsonlRunLogger,
};
use thinking_presentation::{
    ChatRepl, ChatSession, Cli, ConsoleFormatter, OutputConfig, ProgressReporter, ReplConfig,
    TurnRequest,
};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Keep the file writer alive until exit
    let _log_guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    info!("Starting thinking");

    if cli.show_config {
        for line in ConfigLoader::describe_sources(cli.config.as_deref()) {
            println!("{}", line);
        }
        let config = load_config(&cli)?;
        println!();
        println!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let mut config = load_config(&cli)?;
    apply_overrides(&cli, &mut config);

    let issues = config.validate();
    if !issues.is_empty() {
        for issue in &issues {
            warn!("Config issue: {}", issue);
        }
        bail!(
            "Invalid configuration:\n  {}",
            issues
                .iter()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join("\n  ")
        );
    }

    if !config.output.color {
        colored::control::set_override(false);
    }

    let models: Vec<Model> = cli
        .model
        .iter()
        .map(|s| s.parse())
        .collect::<Result<_, _>>()?;
    let language: Option<Language> = cli.language.as_deref().map(str::parse::<Language>).transpose()?;
    let format: OutputFormat = cli
        .output
        .map(Into::into)
        .or(config.output.format)
        .unwrap_or_default();

    // === Dependency Injection ===
    let gateway = Arc::new(HttpBackendGateway::new(config.gateway_config())?);
    let mut orchestrator =
        Orchestrator::new(gateway, config.language_models(), config.execution_params());
    if let Some(path) = &cli.run_log {
        let logger = JsonlRunLogger::new(path)
            .ok_or_else(|| anyhow!("Could not open run log {}", path.display()))?;
        orchestrator = orchestrator.with_logger(Arc::new(logger));
    }

    let session = ChatSession::new(
        Arc::new(orchestrator),
        Arc::new(InMemoryConversationStore::new()),
        Arc::new(EnvCredentialStore::new(config.credential_sources())),
    );

    // Chat mode
    if cli.chat {
        let mut repl = ChatRepl::new(session, models)
            .with_mode(cli.run_mode())
            .with_language(language)
            .with_output(OutputConfig {
                format,
                color: config.output.color,
            })
            .with_repl_config(ReplConfig {
                show_progress: !cli.quiet && config.output.show_progress,
                ..ReplConfig::default()
            });

        repl.run().await?;
        return Ok(());
    }

    // Single question mode - question is required
    let question = match cli.question.clone() {
        Some(q) => q,
        None => bail!("Question is required. Use --chat for interactive mode."),
    };

    let request = TurnRequest::new(question, models, cli.run_mode()).with_language(language);
    let show_progress = !cli.quiet && config.output.show_progress && format != OutputFormat::Json;

    if show_progress {
        println!();
        println!("Question: {}", request.question);
        println!("Mode:     {}", request.mode);
        println!();
    }

    let reporter = ProgressReporter::new();
    let progress: &dyn ProgressNotifier = if show_progress {
        &reporter
    } else {
        &NoProgress
    };

    match session.ask(&request, progress).await? {
        Some(result) => println!("{}", ConsoleFormatter::render(&result, format)),
        None => {
            reporter.clear();
            eprintln!("Cancelled.");
        }
    }

    Ok(())
}

/// Install the tracing subscriber.
///
/// `-v` count picks the level unless `RUST_LOG` is set; `--log-file` adds a
/// non-blocking file writer.
fn init_logging(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let Some(path) = log_file else {
        tracing_subscriber::registry()
            .with(filter)
            .with(console)
            .init();
        return Ok(None);
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Could not create log directory {}", parent.display()))?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Could not open log file {}", path.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer),
        )
        .init();
    Ok(Some(guard))
}

fn load_config(cli: &Cli) -> Result<FileConfig> {
    if cli.no_config {
        return Ok(ConfigLoader::load_defaults());
    }
    ConfigLoader::load(cli.config.as_ref()).map_err(|e| anyhow!("Failed to load config: {}", e))
}

/// Command-line flags win over every config source.
fn apply_overrides(cli: &Cli, config: &mut FileConfig) {
    if let Some(timeout) = cli.timeout {
        config.backend.timeout_seconds = timeout;
    }
    if cli.no_stream {
        config.backend.stream = false;
    }
    if cli.no_summary {
        config.summary.enabled = false;
    }
}
