//! CLI command definitions

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use thinking_domain::RunMode;

/// Output format for run results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Every model's answer followed by the summary
    Full,
    /// Only the summary
    Summary,
    /// JSON output
    Json,
}

impl From<OutputFormat> for thinking_domain::OutputFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Full => Self::Full,
            OutputFormat::Summary => Self::Summary,
            OutputFormat::Json => Self::Json,
        }
    }
}

/// How the models are queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    /// All models at once
    Chat,
    /// One model after another, each seeing the previous answer
    Discuss,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Chat => RunMode::FanOut,
            ModeArg::Discuss => RunMode::SequentialRelay,
        }
    }
}

/// CLI arguments for thinking
#[derive(Parser, Debug)]
#[command(name = "thinking")]
#[command(author, version, about = "Ask several LLMs at once and compare their answers")]
#[command(long_about = r#"
Thinking sends one question to several models and streams their answers
side by side.

Modes:
  chat      All models answer concurrently (default)
  discuss   Models answer in turn, each one reviewing the previous answer

When at least two models answer successfully, a summary comparing the
answers is requested afterwards.

Configuration files are loaded from (in priority order):
1. THINKING_* environment variables
2. --config <path>     Explicit config file
3. ./thinking.toml     Project-level config
4. ~/.config/thinking/config.toml   Global config

API keys are read from <MODEL>_API_KEY variables (e.g. OPENAI_API_KEY)
or the [credentials] section of the config file.

Example:
  thinking "What's the best way to handle errors in Rust?"
  thinking -m openai -m deepseek --discuss "Is P equal to NP?"
  thinking --chat --language zh
"#)]
pub struct Cli {
    /// The question to ask (not required in chat mode)
    pub question: Option<String>,

    /// Start interactive chat mode
    #[arg(short, long)]
    pub chat: bool,

    /// Models to query (can be specified multiple times; defaults to the
    /// language's roster)
    #[arg(short, long, value_name = "MODEL")]
    pub model: Vec<String>,

    /// Query mode
    #[arg(long, value_enum, default_value = "chat")]
    pub mode: ModeArg,

    /// Shorthand for `--mode discuss`
    #[arg(short, long, conflicts_with = "mode")]
    pub discuss: bool,

    /// Language tag sent to the backends (detected from the question when omitted)
    #[arg(short, long, value_name = "TAG")]
    pub language: Option<String>,

    /// Never request a summary
    #[arg(long)]
    pub no_summary: bool,

    /// Ask for single JSON replies instead of streamed bodies
    #[arg(long)]
    pub no_stream: bool,

    /// Per-call timeout in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress indicators
    #[arg(short, long)]
    pub quiet: bool,

    /// Write diagnostic logs to this file as well
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Append a JSONL record of every run to this file
    #[arg(long, value_name = "PATH")]
    pub run_log: Option<PathBuf>,

    /// Path to configuration file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

impl Cli {
    /// Mode selected by `--mode` or `--discuss`.
    pub fn run_mode(&self) -> RunMode {
        if self.discuss {
            RunMode::SequentialRelay
        } else {
            self.mode.into()
        }
    }
}
