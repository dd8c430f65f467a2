//! Console output formatter for run results

use colored::Colorize;
use thinking_domain::{ChannelOutcome, ChannelResult, OutputFormat, RunMode, RunResult};

/// Formats run results for console display
pub struct ConsoleFormatter;

impl ConsoleFormatter {
    /// Render `result` in the requested format.
    pub fn render(result: &RunResult, format: OutputFormat) -> String {
        match format {
            OutputFormat::Full => Self::format(result),
            OutputFormat::Summary => Self::format_summary_only(result),
            OutputFormat::Json => Self::format_json(result),
        }
    }

    /// Format the complete run: every channel block, then the summary
    pub fn format(result: &RunResult) -> String {
        let mut output = String::new();

        output.push_str(&Self::header("Thinking Results"));
        output.push('\n');

        output.push_str(&format!(
            "{} {}\n",
            "Question:".cyan().bold(),
            result.question
        ));
        output.push_str(&format!(
            "{} {}  {} {}\n",
            "Mode:".cyan().bold(),
            result.mode,
            "Language:".cyan().bold(),
            result.language
        ));

        output.push_str(&Self::section_header("Responses"));
        for (i, response) in result.responses.iter().enumerate() {
            let label = match result.mode {
                RunMode::SequentialRelay => format!("{}. {}", i + 1, Self::channel_name(response)),
                RunMode::FanOut => Self::channel_name(response),
            };
            output.push_str(&Self::channel_block(&label, response));
        }

        output.push_str(&Self::section_header("Summary"));
        output.push_str(&Self::summary_block(result));

        output.push_str(&Self::footer());
        output
    }

    /// Format as JSON
    pub fn format_json(result: &RunResult) -> String {
        serde_json::to_string_pretty(result).unwrap_or_else(|_| "{}".to_string())
    }

    /// Only the summary; falls back to the full view when there is none
    pub fn format_summary_only(result: &RunResult) -> String {
        let Some(summary) = result.summary_text() else {
            return Self::format(result);
        };

        let mut output = String::new();
        output.push_str(&format!("{}\n\n", "=== Summary ===".cyan().bold()));
        output.push_str(&format!("{} {}\n\n", "Q:".bold(), result.question));
        output.push_str(&format!(
            "{} {}\n\n",
            "Models consulted:".dimmed(),
            result
                .responses
                .iter()
                .map(Self::channel_name)
                .collect::<Vec<_>>()
                .join(", ")
        ));
        output.push_str(summary);
        output.push('\n');
        output
    }

    fn channel_block(label: &str, response: &ChannelResult) -> String {
        match &response.outcome {
            ChannelOutcome::Success { text } => format!(
                "\n{} {}\n{}\n",
                format!("── {label} ──").yellow().bold(),
                "✓".green(),
                text
            ),
            ChannelOutcome::ImplicitCompletion { text } => format!(
                "\n{} {}\n{}\n",
                format!("── {label} ──").yellow().bold(),
                "✓ (stream ended without done marker)".dimmed(),
                text
            ),
            ChannelOutcome::Error {
                message, partial, ..
            } => {
                let mut block = format!(
                    "\n{} {}\n",
                    format!("── {label} ──").red().bold(),
                    "✗".red()
                );
                if !partial.is_empty() {
                    block.push_str(partial);
                    block.push('\n');
                }
                block.push_str(&format!("{} {}\n", "Error:".red(), message));
                block
            }
        }
    }

    fn summary_block(result: &RunResult) -> String {
        if result.skip_summary {
            return format!(
                "\n{}\n",
                "Summary skipped.".dimmed()
            );
        }
        match &result.summary {
            None => format!("\n{}\n", "No summary.".dimmed()),
            Some(summary) => Self::channel_block("Summary", summary),
        }
    }

    fn channel_name(response: &ChannelResult) -> String {
        match response.model() {
            Some(model) => model.display_name(),
            None => response.channel_id.to_string(),
        }
    }

    fn header(title: &str) -> String {
        let line = "=".repeat(60);
        format!("{}\n{:^60}\n{}", line.cyan(), title.bold(), line.cyan())
    }

    fn section_header(title: &str) -> String {
        format!("\n{}\n{}\n", title.cyan().bold(), "-".repeat(40))
    }

    fn footer() -> String {
        format!("\n{}\n", "=".repeat(60).cyan())
    }

    /// Indent a multi-line string
    pub fn indent(text: &str, prefix: &str) -> String {
        text.lines()
            .map(|line| format!("{}{}", prefix, line))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinking_domain::{ChannelErrorKind, ChannelId, Language, Model, RunState};

    fn model(id: &str) -> Model {
        Model::try_new(id).unwrap()
    }

    fn result(summary: Option<&str>) -> RunResult {
        RunResult {
            mode: RunMode::FanOut,
            question: "What is 2+2?".to_string(),
            language: Language::English,
            responses: vec![
                ChannelResult::new(
                    ChannelId::Model(model("openai")),
                    ChannelOutcome::Success {
                        text: "four".to_string(),
                    },
                ),
                ChannelResult::new(
                    ChannelId::Model(model("grok")),
                    ChannelOutcome::Error {
                        kind: ChannelErrorKind::NetworkFailure,
                        message: "Request timed out".to_string(),
                        partial: String::new(),
                    },
                ),
            ],
            summary: summary.map(|text| {
                ChannelResult::new(
                    ChannelId::Summary,
                    ChannelOutcome::Success {
                        text: text.to_string(),
                    },
                )
            }),
            skip_summary: summary.is_none(),
            state: RunState::Complete,
            discussion: None,
        }
    }

    #[test]
    fn test_full_output_lists_every_channel() {
        colored::control::set_override(false);
        let output = ConsoleFormatter::format(&result(None));
        assert!(output.contains("── OPENAI ──"));
        assert!(output.contains("four"));
        assert!(output.contains("── GROK ──"));
        assert!(output.contains("Error: Request timed out"));
        assert!(output.contains("Summary skipped"));
    }

    #[test]
    fn test_summary_only_falls_back_without_summary() {
        colored::control::set_override(false);
        let with = ConsoleFormatter::format_summary_only(&result(Some("both agree")));
        assert!(with.contains("both agree"));
        assert!(with.contains("OPENAI, GROK"));
        assert!(!with.contains("── OPENAI ──"));

        let without = ConsoleFormatter::format_summary_only(&result(None));
        assert!(without.contains("── OPENAI ──"));
    }

    #[test]
    fn test_json_output() {
        let json = ConsoleFormatter::render(&result(Some("s")), OutputFormat::Json);
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["question"], "What is 2+2?");
        assert_eq!(value["responses"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_indent() {
        assert_eq!(ConsoleFormatter::indent("a\nb", "  "), "  a\n  b");
    }
}
