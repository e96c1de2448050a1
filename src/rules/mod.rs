//! Firewall rule execution
//!
//! `RuleExecutor` is the seam between the cycler and the outside world.
//! `ContainerExecutor` implements it by running `iptables` inside a container
//! through the container runtime's `exec` subcommand.

pub mod command;
pub mod container;

use async_trait::async_trait;

use crate::error::CommandError;

pub use container::ContainerExecutor;

/// Applies and removes the drop rule on a target
#[async_trait]
pub trait RuleExecutor: Send + Sync {
    /// Make sure the firewall tooling exists on the target
    async fn ensure_capability(&self, target: &str) -> Result<(), CommandError>;

    /// Drop outbound traffic from `target` to `destination`.
    ///
    /// Must be idempotent: blocking an already blocked destination is a no-op.
    async fn block(&self, target: &str, destination: &str) -> Result<(), CommandError>;

    /// Remove the drop rule again
    async fn unblock(&self, target: &str, destination: &str) -> Result<(), CommandError>;
}
