//! Availability cycler
//!
//! Alternates a destination between blocked and available for a target,
//! forever. The only ways out are an executor failure, which is returned
//! as an error, or the process being killed.

use std::convert::Infallible;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::DropperConfig;
use crate::display::Reporter;
use crate::error::DropperError;
use crate::rules::RuleExecutor;

/// Reachability of the destination from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Traffic to the destination is dropped
    Blocked,
    /// Traffic to the destination flows normally
    Available,
}

impl LinkState {
    /// The state that follows this one
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Blocked => Self::Available,
            Self::Available => Self::Blocked,
        }
    }

    /// How long this state is held once entered
    #[must_use]
    pub const fn hold_duration(self, config: &DropperConfig) -> Duration {
        match self {
            Self::Blocked => config.unavailable_duration,
            Self::Available => config.available_duration,
        }
    }
}

/// Suspends the cycler between transitions
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Wait for `duration` to pass
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Drives the blocked/available alternation
pub struct AvailabilityCycler<E, S, R> {
    config: DropperConfig,
    executor: E,
    sleeper: S,
    reporter: R,
}

impl<E, S, R> AvailabilityCycler<E, S, R>
where
    E: RuleExecutor,
    S: Sleeper,
    R: Reporter,
{
    /// Create a cycler from a validated configuration and its collaborators
    #[must_use]
    pub const fn new(config: DropperConfig, executor: E, sleeper: S, reporter: R) -> Self {
        Self {
            config,
            executor,
            sleeper,
            reporter,
        }
    }

    /// Prepare the target, then cycle forever.
    ///
    /// Never returns `Ok`. Any executor failure ends the loop immediately;
    /// the rule is left in whatever state it was in.
    pub async fn run(&self) -> Result<Infallible, DropperError> {
        self.reporter.started(&self.config);
        self.prepare().await?;

        let mut state = LinkState::Available;
        loop {
            state = self.step(state).await?;
        }
    }

    /// Install the firewall tooling on the target.
    pub async fn prepare(&self) -> Result<(), DropperError> {
        let target = &self.config.target;
        self.reporter.preparing(target);
        self.executor
            .ensure_capability(target)
            .await
            .map_err(|source| DropperError::Preparation {
                target: target.clone(),
                source,
            })
    }

    /// Leave `current`, then hold the new state for its configured duration.
    ///
    /// Returns the state that was entered.
    pub async fn step(&self, current: LinkState) -> Result<LinkState, DropperError> {
        let next = current.next();
        let target = &self.config.target;
        let destination = &self.config.destination;

        match next {
            LinkState::Blocked => self
                .executor
                .block(target, destination)
                .await
                .map_err(|source| DropperError::RuleApplication {
                    target: target.clone(),
                    destination: destination.clone(),
                    source,
                })?,
            LinkState::Available => self
                .executor
                .unblock(target, destination)
                .await
                .map_err(|source| DropperError::RuleRemoval {
                    target: target.clone(),
                    destination: destination.clone(),
                    source,
                })?,
        }

        self.reporter.transition(next, &self.config);
        self.sleeper.sleep(next.hold_duration(&self.config)).await;

        Ok(next)
    }
}
