//! Dropper - network availability chaos tool
//!
//! Dropper cuts a container off from a network destination and reconnects
//! it again, over and over, by toggling an `iptables` drop rule inside the
//! container. It also ships a clock check that verifies wall-clock time
//! jumped backwards during a run.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

pub mod clock;
pub mod config;
pub mod cycler;
pub mod display;
pub mod error;
pub mod rules;

#[cfg(test)]
pub mod testutil;

use std::convert::Infallible;

// Re-export commonly used types
pub use clock::{SystemClock, TimeCheck, TimeCheckReport, WallClock};
pub use config::{DropperConfig, RawConfig};
pub use cycler::{AvailabilityCycler, LinkState, Sleeper, TokioSleeper};
pub use display::{Reporter, StatusLine};
pub use error::{CommandError, DropperError, TimeCheckError};
pub use rules::{ContainerExecutor, RuleExecutor};

/// Validate `raw` and cycle the destination forever.
///
/// Fails with `DropperError::Configuration` before touching the executor if
/// the mapping is invalid. Otherwise only returns on an executor failure.
pub async fn run<E, S, R>(
    raw: &RawConfig,
    executor: E,
    sleeper: S,
    reporter: R,
) -> Result<Infallible, DropperError>
where
    E: RuleExecutor,
    S: Sleeper,
    R: Reporter,
{
    let config = DropperConfig::from_map(raw)?;
    AvailabilityCycler::new(config, executor, sleeper, reporter)
        .run()
        .await
}
