//! REPL (Read-Eval-Print Loop) for interactive chat

use crate::chat::session::{ChatSession, TurnRequest};
use crate::config::{OutputConfig, ReplConfig};
use crate::{ConsoleFormatter, ProgressReporter};
use colored::Colorize;
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use thinking_application::{NoProgress, ProgressNotifier};
use thinking_domain::{Language, Model, RunMode, RunResult};
use tracing::warn;

const HISTORY_CAPACITY: usize = 1000;

/// What a slash command asks the loop to do next.
#[derive(Debug, PartialEq, Eq)]
enum CommandResult {
    Continue,
    Summarize,
    Exit,
}

/// Interactive chat REPL
pub struct ChatRepl {
    session: ChatSession,
    models: Vec<Model>,
    mode: RunMode,
    language: Option<Language>,
    output: OutputConfig,
    repl: ReplConfig,
}

impl ChatRepl {
    pub fn new(session: ChatSession, models: Vec<Model>) -> Self {
        Self {
            session,
            models,
            mode: RunMode::FanOut,
            language: None,
            output: OutputConfig::default(),
            repl: ReplConfig::default(),
        }
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self
    }

    pub fn with_output(mut self, output: OutputConfig) -> Self {
        self.output = output;
        self
    }

    pub fn with_repl_config(mut self, repl: ReplConfig) -> Self {
        self.repl = repl;
        self
    }

    fn editor(&self) -> Reedline {
        let editor = Reedline::create();
        let Some(path) = self.repl.history_file.clone() else {
            return editor;
        };
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        match FileBackedHistory::with_file(HISTORY_CAPACITY, path) {
            Ok(history) => editor.with_history(Box::new(history)),
            Err(e) => {
                warn!("Could not open REPL history: {}", e);
                editor
            }
        }
    }

    /// Run the interactive REPL
    pub async fn run(&mut self) -> std::io::Result<()> {
        let mut editor = self.editor();
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic("thinking".to_string()),
            DefaultPromptSegment::Empty,
        );

        self.print_welcome();

        loop {
            match editor.read_line(&prompt)? {
                Signal::Success(line) => {
                    let line = line.trim();

                    // Skip empty lines
                    if line.is_empty() {
                        continue;
                    }

                    if line.starts_with('/') {
                        match self.handle_command(line) {
                            CommandResult::Exit => break,
                            CommandResult::Summarize => self.summarize().await,
                            CommandResult::Continue => {}
                        }
                        continue;
                    }

                    self.process_question(line).await;
                }
                Signal::CtrlC => {
                    println!("^C");
                    continue;
                }
                Signal::CtrlD => {
                    println!("Bye!");
                    break;
                }
            }
        }

        Ok(())
    }

    fn print_welcome(&self) {
        println!();
        println!("╭─────────────────────────────────────────────╮");
        println!("│             Thinking - Chat Mode            │");
        println!("╰─────────────────────────────────────────────╯");
        println!();
        println!("Models: {}", self.models_label());
        println!("Mode:   {}", self.mode);
        println!();
        Self::print_help();
    }

    fn print_help() {
        println!("Commands:");
        println!("  /help, /h, /?           - Show this help");
        println!("  /models [id ...]        - Show or replace the models");
        println!("  /mode chat|discuss      - Switch query mode");
        println!("  /lang <tag>|auto        - Pin or unpin the language");
        println!("  /summary                - Summarize the last answers again");
        println!("  /clear                  - Forget the conversation");
        println!("  /quit, /exit, /q        - Exit chat");
        println!();
    }

    fn models_label(&self) -> String {
        if self.models.is_empty() {
            "(language default)".to_string()
        } else {
            self.models
                .iter()
                .map(|m| m.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }

    /// Handle slash commands.
    fn handle_command(&mut self, line: &str) -> CommandResult {
        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match command {
            "/quit" | "/exit" | "/q" => {
                println!("Bye!");
                CommandResult::Exit
            }
            "/help" | "/h" | "/?" => {
                println!();
                Self::print_help();
                CommandResult::Continue
            }
            "/models" => {
                if !args.is_empty() {
                    self.models = args.iter().filter_map(Model::try_new).collect();
                }
                println!("Models: {}", self.models_label());
                CommandResult::Continue
            }
            "/mode" => {
                match args.first().map(|m| m.parse::<RunMode>()) {
                    Some(Ok(mode)) => {
                        self.mode = mode;
                        println!("Mode: {}", self.mode);
                    }
                    Some(Err(e)) => println!("{}", e.as_str().red()),
                    None => println!("Mode: {}", self.mode),
                }
                CommandResult::Continue
            }
            "/lang" => {
                match args.first().copied() {
                    None => println!(
                        "Language: {}",
                        self.language
                            .as_ref()
                            .map_or("auto".to_string(), |l| l.to_string())
                    ),
                    Some("auto") => {
                        self.language = None;
                        println!("Language: auto");
                    }
                    Some(tag) => match tag.parse::<Language>() {
                        Ok(language) => {
                            println!("Language: {}", language);
                            self.language = Some(language);
                        }
                        Err(e) => println!("{}", e.to_string().red()),
                    },
                }
                CommandResult::Continue
            }
            "/summary" => CommandResult::Summarize,
            "/clear" => {
                self.session.store().clear();
                println!("Conversation cleared.");
                CommandResult::Continue
            }
            _ => {
                println!("Unknown command: {}", command);
                println!("Type /help for available commands");
                CommandResult::Continue
            }
        }
    }

    async fn process_question(&self, question: &str) {
        println!();

        let request = TurnRequest::new(question, self.models.clone(), self.mode)
            .with_language(self.language.clone());

        let reporter = ProgressReporter::new();
        let progress: &dyn ProgressNotifier = if self.repl.show_progress {
            &reporter
        } else {
            &NoProgress
        };

        match self.session.ask(&request, progress).await {
            Ok(Some(result)) => self.print_result(&result),
            Ok(None) => {
                reporter.clear();
                println!("{}", "Cancelled.".yellow());
            }
            Err(e) => eprintln!("{} {}", "Error:".red(), e),
        }
        println!();
    }

    async fn summarize(&self) {
        let reporter = ProgressReporter::new();
        match self.session.resummarize(&reporter).await {
            Ok(Some(result)) => match result.summary_text() {
                Some(text) => println!("\n{}\n", text),
                None => println!("{}", "Summary failed.".red()),
            },
            Ok(None) => println!("{}", "Cancelled.".yellow()),
            Err(e) => eprintln!("{} {}", "Error:".red(), e),
        }
    }

    fn print_result(&self, result: &RunResult) {
        println!("{}", ConsoleFormatter::render(result, self.output.format));
    }
}
