//! Shared test utilities
//!
//! Recording fakes for the cycler's collaborators. Every fake appends to a
//! shared `Journal` so tests can assert on the interleaving of calls.
//! Only compiled in test builds.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DropperConfig;
use crate::cycler::{LinkState, Sleeper};
use crate::display::Reporter;
use crate::error::CommandError;
use crate::rules::RuleExecutor;

/// One observed interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `Reporter::started`
    Started,
    /// `Reporter::preparing`
    Preparing(String),
    /// `Reporter::transition`
    Reported(LinkState),
    /// `RuleExecutor::ensure_capability`
    EnsureCapability(String),
    /// `RuleExecutor::block`
    Block(String, String),
    /// `RuleExecutor::unblock`
    Unblock(String, String),
    /// `Sleeper::sleep`
    Sleep(Duration),
}

/// Ordered record of calls shared between fakes
#[derive(Debug, Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    fn record(&self, call: Call) {
        self.0.lock().unwrap().push(call);
    }

    /// Every recorded call, in order
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    /// Recorded executor and sleep calls, without reporter events
    #[must_use]
    pub fn executor_and_sleep_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| !matches!(c, Call::Started | Call::Preparing(_) | Call::Reported(_)))
            .collect()
    }
}

/// In-memory rule executor.
///
/// Keeps a set of active rules so `block` is idempotent, and can be told to
/// fail a given call to bound an otherwise endless loop.
#[derive(Debug, Default)]
pub struct MockExecutor {
    journal: Journal,
    rules: Mutex<BTreeSet<(String, String)>>,
    fail_ensure: bool,
    fail_block_on: Option<usize>,
    fail_unblock_on: Option<usize>,
    block_calls: AtomicUsize,
    unblock_calls: AtomicUsize,
}

impl MockExecutor {
    /// Create a mock that records into `journal` and never fails
    #[must_use]
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            ..Self::default()
        }
    }

    /// Fail `ensure_capability`
    #[must_use]
    pub fn fail_ensure(mut self) -> Self {
        self.fail_ensure = true;
        self
    }

    /// Fail the `n`th call (1-based) to `block`
    #[must_use]
    pub fn fail_block_on_call(mut self, n: usize) -> Self {
        self.fail_block_on = Some(n);
        self
    }

    /// Fail the `n`th call (1-based) to `unblock`
    #[must_use]
    pub fn fail_unblock_on_call(mut self, n: usize) -> Self {
        self.fail_unblock_on = Some(n);
        self
    }

    /// Number of rules currently in place
    #[must_use]
    pub fn active_rules(&self) -> usize {
        self.rules.lock().unwrap().len()
    }
}

fn failure(op: &str) -> CommandError {
    CommandError::Exited {
        command: format!("mock {op}"),
        exit_code: Some(1),
        stderr: format!("{op} failed"),
    }
}

#[async_trait]
impl RuleExecutor for MockExecutor {
    async fn ensure_capability(&self, target: &str) -> Result<(), CommandError> {
        self.journal.record(Call::EnsureCapability(target.to_string()));
        if self.fail_ensure {
            return Err(failure("ensure_capability"));
        }
        Ok(())
    }

    async fn block(&self, target: &str, destination: &str) -> Result<(), CommandError> {
        self.journal
            .record(Call::Block(target.to_string(), destination.to_string()));
        if self.fail_block_on == Some(self.block_calls.fetch_add(1, Ordering::SeqCst) + 1) {
            return Err(failure("block"));
        }
        self.rules
            .lock()
            .unwrap()
            .insert((target.to_string(), destination.to_string()));
        Ok(())
    }

    async fn unblock(&self, target: &str, destination: &str) -> Result<(), CommandError> {
        self.journal
            .record(Call::Unblock(target.to_string(), destination.to_string()));
        if self.fail_unblock_on == Some(self.unblock_calls.fetch_add(1, Ordering::SeqCst) + 1) {
            return Err(failure("unblock"));
        }
        self.rules
            .lock()
            .unwrap()
            .remove(&(target.to_string(), destination.to_string()));
        Ok(())
    }
}

/// Sleeper that records the requested duration and returns immediately
#[derive(Debug, Clone)]
pub struct RecordingSleeper {
    journal: Journal,
}

impl RecordingSleeper {
    /// Create a sleeper recording into `journal`
    #[must_use]
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.journal.record(Call::Sleep(duration));
    }
}

/// Reporter that records events instead of printing them
#[derive(Debug, Clone)]
pub struct RecordingReporter {
    journal: Journal,
}

impl RecordingReporter {
    /// Create a reporter recording into `journal`
    #[must_use]
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
        }
    }
}

impl Reporter for RecordingReporter {
    fn started(&self, _config: &DropperConfig) {
        self.journal.record(Call::Started);
    }

    fn preparing(&self, target: &str) {
        self.journal.record(Call::Preparing(target.to_string()));
    }

    fn transition(&self, state: LinkState, _config: &DropperConfig) {
        self.journal.record(Call::Reported(state));
    }
}

/// Create a config for target `c1` and destination `10.0.0.5`
#[must_use]
pub fn test_config(unavailable_secs: u64, available_secs: u64) -> DropperConfig {
    DropperConfig {
        target: "c1".to_string(),
        destination: "10.0.0.5".to_string(),
        unavailable_duration: Duration::from_secs(unavailable_secs),
        available_duration: Duration::from_secs(available_secs),
        runtime: "docker".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_block_is_idempotent() {
        let journal = Journal::default();
        let executor = MockExecutor::new(&journal);

        executor.block("c1", "10.0.0.5").await.unwrap();
        executor.block("c1", "10.0.0.5").await.unwrap();
        assert_eq!(executor.active_rules(), 1);

        executor.unblock("c1", "10.0.0.5").await.unwrap();
        assert_eq!(executor.active_rules(), 0);
    }

    #[tokio::test]
    async fn test_mock_fails_only_on_requested_call() {
        let journal = Journal::default();
        let executor = MockExecutor::new(&journal).fail_block_on_call(2);

        assert!(executor.block("c1", "10.0.0.5").await.is_ok());
        assert!(executor.block("c1", "10.0.0.5").await.is_err());
        assert!(executor.block("c1", "10.0.0.5").await.is_ok());
    }
}
