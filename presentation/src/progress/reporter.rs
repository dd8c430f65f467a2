//! Progress reporting while a run streams

use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thinking_application::ProgressNotifier;
use thinking_domain::{ChannelId, ChannelSnapshot, RunState, TerminalStatus};

/// One spinner line per channel, updated from coalesced snapshots
pub struct ProgressReporter {
    multi: MultiProgress,
    bars: Mutex<HashMap<ChannelId, ProgressBar>>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {prefix:.bold} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn channel_label(channel: &ChannelId) -> String {
        match channel.model() {
            Some(model) => model.display_name(),
            None => "SUMMARY".to_string(),
        }
    }

    fn terminal_message(snapshot: &ChannelSnapshot) -> String {
        let bytes = snapshot.text.len();
        match snapshot.terminal {
            Some(TerminalStatus::Success) => format!("{} {} bytes", "v".green(), bytes),
            Some(TerminalStatus::ImplicitCompletion) => {
                format!("{} {} bytes (no done marker)", "v".green(), bytes)
            }
            _ => format!(
                "{} {}",
                "x".red(),
                snapshot.error.as_deref().unwrap_or("failed")
            ),
        }
    }

    /// Remove every bar; used when a run is abandoned.
    pub fn clear(&self) {
        let mut bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, bar) in bars.drain() {
            bar.finish_and_clear();
        }
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressNotifier for ProgressReporter {
    fn on_state(&self, state: RunState) {
        if state == RunState::Settling {
            let _ = self.multi.println(format!("{} {}", "->".cyan(), "settling".dimmed()));
        }
    }

    fn on_channel_start(&self, channel: &ChannelId) {
        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(Self::spinner_style());
        bar.set_prefix(Self::channel_label(channel));
        bar.set_message("waiting...");
        bar.enable_steady_tick(Duration::from_millis(120));

        self.bars
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(channel.clone(), bar);
    }

    fn on_snapshot(&self, snapshot: &ChannelSnapshot) {
        let bars = self.bars.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(bar) = bars.get(&snapshot.channel_id) else {
            return;
        };
        if snapshot.is_terminal() {
            bar.finish_with_message(Self::terminal_message(snapshot));
        } else {
            bar.set_message(format!("streaming {} bytes", snapshot.text.len()));
        }
    }

    fn on_summary_skipped(&self) {
        let _ = self
            .multi
            .println(format!("{} {}", "->".cyan(), "summary skipped".dimmed()));
    }
}

/// Simple text-based progress (no fancy UI)
pub struct SimpleProgress;

impl ProgressNotifier for SimpleProgress {
    fn on_state(&self, _state: RunState) {}

    fn on_channel_start(&self, channel: &ChannelId) {
        println!(
            "{} {}",
            "->".cyan(),
            ProgressReporter::channel_label(channel).bold()
        );
    }

    fn on_snapshot(&self, snapshot: &ChannelSnapshot) {
        if snapshot.is_terminal() {
            println!(
                "  {} {}",
                ProgressReporter::channel_label(&snapshot.channel_id),
                ProgressReporter::terminal_message(snapshot)
            );
        }
    }

    fn on_summary_skipped(&self) {
        println!("  {}", "summary skipped".dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinking_domain::Model;

    fn snapshot(terminal: Option<TerminalStatus>, error: Option<&str>) -> ChannelSnapshot {
        ChannelSnapshot {
            channel_id: ChannelId::Model(Model::try_new("openai").unwrap()),
            text: "abc".to_string(),
            streaming: terminal.is_none(),
            terminal,
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn test_terminal_messages() {
        colored::control::set_override(false);
        let ok = ProgressReporter::terminal_message(&snapshot(Some(TerminalStatus::Success), None));
        assert_eq!(ok, "v 3 bytes");

        let failed = ProgressReporter::terminal_message(&snapshot(
            Some(TerminalStatus::Error),
            Some("Request timed out"),
        ));
        assert_eq!(failed, "x Request timed out");
    }

    #[test]
    fn test_reporter_tracks_channels() {
        let reporter = ProgressReporter::new();
        let channel = ChannelId::Model(Model::try_new("openai").unwrap());

        reporter.on_channel_start(&channel);
        reporter.on_snapshot(&snapshot(None, None));
        reporter.on_snapshot(&snapshot(Some(TerminalStatus::Success), None));
        assert_eq!(reporter.bars.lock().unwrap().len(), 1);

        reporter.clear();
        assert!(reporter.bars.lock().unwrap().is_empty());
    }

    #[test]
    fn test_channel_labels() {
        assert_eq!(ProgressReporter::channel_label(&ChannelId::Summary), "SUMMARY");
        let grok = ChannelId::Model(Model::try_new("grok").unwrap());
        assert_eq!(ProgressReporter::channel_label(&grok), "GROK");
    }
}
