//! Terminal status output
//!
//! Human-readable, timestamped status lines for the cycler and the clock
//! check. All output goes to stderr so stdout remains clean for piping.

use chrono::{DateTime, Local, Utc};
use colored::Colorize;

use crate::config::DropperConfig;
use crate::cycler::LinkState;

/// Receives the cycler's observability events
pub trait Reporter: Send + Sync {
    /// The cycler is about to start with this configuration
    fn started(&self, config: &DropperConfig);

    /// Firewall tooling is about to be installed on the target
    fn preparing(&self, target: &str);

    /// The destination just entered `state`
    fn transition(&self, state: LinkState, config: &DropperConfig);
}

/// Writes status lines to stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusLine;

impl StatusLine {
    /// Create a new status line writer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Reporter for StatusLine {
    fn started(&self, config: &DropperConfig) {
        eprintln!(
            "\n{} {}",
            "===".bold().cyan(),
            "Dropper running".bold().cyan()
        );
        eprintln!("  {} {config}", "Config:".dimmed());
        eprintln!("{}", "─".repeat(50).dimmed());
    }

    fn preparing(&self, target: &str) {
        eprintln!("{} Installing iptables on {}...", timestamp(), target.bold());
    }

    fn transition(&self, state: LinkState, config: &DropperConfig) {
        let line = format_transition(state, config);
        let line = match state {
            LinkState::Blocked => line.red().bold(),
            LinkState::Available => line.green().bold(),
        };
        eprintln!("{} {line}", timestamp());
    }
}

/// Render the message announcing a state change.
#[must_use]
pub fn format_transition(state: LinkState, config: &DropperConfig) -> String {
    let (marker, word) = match state {
        LinkState::Blocked => ("---", "unavailable"),
        LinkState::Available => ("+++", "available"),
    };
    format!(
        "{marker} {} is {word} now for {}. Switching in {} sec",
        config.destination,
        config.target,
        state.hold_duration(config).as_secs()
    )
}

/// Print a single wall-clock reading taken by the clock check
pub fn print_reading(reading: DateTime<Utc>) {
    eprintln!("{} {reading}", "Reported time:".dimmed());
}

/// Print the clock check summary
pub fn print_time_summary(deltas: &[f64], max_backward_secs: f64, passed: bool) {
    let deltas = deltas
        .iter()
        .map(|d| format!("{d:.3}"))
        .collect::<Vec<_>>()
        .join(", ");
    eprintln!("{} [{deltas}]", "deltas:".dimmed());

    let verdict = if passed {
        "PASSED".green().bold()
    } else {
        "FAILED".red().bold()
    };
    eprintln!("  {verdict} max negative delta: {max_backward_secs:.3}s");
}

fn timestamp() -> String {
    format!("[{}]", Local::now().format("%Y-%m-%d %H:%M:%S"))
        .dimmed()
        .to_string()
}
