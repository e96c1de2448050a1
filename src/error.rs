//! Error types
//!
//! Every error here is fatal: the binary propagates it to `main` and exits
//! non-zero. Nothing is retried.

use std::io;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the availability cycler
#[derive(Debug, Error)]
pub enum DropperError {
    /// Missing or invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Installing the firewall tooling on the target failed
    #[error("Failed to prepare target '{target}'")]
    Preparation {
        /// Target the preparation ran against
        target: String,
        /// Underlying command failure
        #[source]
        source: CommandError,
    },

    /// Inserting the drop rule failed
    #[error("Failed to block {destination} for '{target}'")]
    RuleApplication {
        /// Target the rule was applied on
        target: String,
        /// Destination that should have been blocked
        destination: String,
        /// Underlying command failure
        #[source]
        source: CommandError,
    },

    /// Removing the drop rule failed
    #[error("Failed to unblock {destination} for '{target}'")]
    RuleRemoval {
        /// Target the rule was removed from
        target: String,
        /// Destination that should have been unblocked
        destination: String,
        /// Underlying command failure
        #[source]
        source: CommandError,
    },
}

impl DropperError {
    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Failure of a single external command invocation
#[derive(Debug, Error)]
pub enum CommandError {
    /// The process could not be started
    #[error("Failed to spawn '{program}'")]
    Spawn {
        /// Program that was being started
        program: String,
        /// OS error
        #[source]
        source: io::Error,
    },

    /// The process ran but did not exit cleanly
    #[error("`{command}` exited with {}", describe_exit(.exit_code, .stderr))]
    Exited {
        /// The command line, for display
        command: String,
        /// Exit code (None if killed by signal)
        exit_code: Option<i32>,
        /// Captured stderr output
        stderr: String,
    },

    /// Reading the process output or waiting for it failed
    #[error("I/O error while running `{command}`")]
    Io {
        /// The command line, for display
        command: String,
        /// OS error
        #[source]
        source: io::Error,
    },
}

/// Errors produced by the clock jump check
#[derive(Debug, Error, PartialEq)]
pub enum TimeCheckError {
    /// At least two readings are needed to compute a delta
    #[error("Need at least 2 samples to compare, got {0}")]
    TooFewSamples(u32),

    /// The clock never moved back far enough
    #[error(
        "Time did not move backwards during the test (max negative delta {:.3}s, required more than {}s)",
        .max_backward_secs,
        whole_secs(.min_jump)
    )]
    NoBackwardJump {
        /// Largest observed backward step, in seconds (negative if the clock only moved forward)
        max_backward_secs: f64,
        /// Threshold the step had to exceed
        min_jump: Duration,
    },
}

/// Describe how a process ended, returning "signal" if it was killed.
#[allow(clippy::ref_option)]
fn describe_exit(exit_code: &Option<i32>, stderr: &str) -> String {
    let code = exit_code.map_or_else(|| "signal".to_string(), |c| format!("code {c}"));
    let stderr = stderr.trim();
    if stderr.is_empty() {
        code
    } else {
        format!("{code}: {stderr}")
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn whole_secs(duration: &Duration) -> u64 {
    duration.as_secs()
}
