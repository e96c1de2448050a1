//! Dropper - network availability chaos tool
//!
//! CLI entry point.

// Allow multiple crate versions from dependencies (can't easily control)
#![allow(clippy::multiple_crate_versions)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use dropper::config::{
    self, AVAILABLE_SECONDS_KEY, IP_KEY, RUNTIME_KEY, TARGET_KEY, UNAVAILABLE_SECONDS_KEY,
};
use dropper::{
    AvailabilityCycler, ContainerExecutor, DropperConfig, RawConfig, StatusLine, SystemClock,
    TimeCheck, TokioSleeper,
};

/// Network availability chaos tool
///
/// Periodically blocks and unblocks traffic from a container to a
/// destination address by toggling an iptables rule inside the container.
#[derive(Parser, Debug)]
#[command(name = "dropper", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Block and unblock a destination forever
    Run(RunArgs),
    /// Verify that wall-clock time jumped backwards during the run
    TimeCheck(TimeCheckArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// TOML file with a [dropper] table; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Container to act on
    #[arg(long)]
    target: Option<String>,

    /// Destination address (or CIDR block) to block
    #[arg(long)]
    ip: Option<String>,

    /// Seconds the destination stays blocked per cycle (default 10)
    #[arg(long)]
    unavailable_seconds: Option<String>,

    /// Seconds the destination stays reachable per cycle (default 10)
    #[arg(long)]
    available_seconds: Option<String>,

    /// Container runtime binary (default docker)
    #[arg(long)]
    runtime: Option<String>,
}

#[derive(Args, Debug)]
struct TimeCheckArgs {
    /// Number of readings to take
    #[arg(long, default_value_t = 20)]
    samples: u32,

    /// Seconds to wait after each reading
    #[arg(long, default_value_t = 15)]
    interval: u64,

    /// Seconds the clock has to jump back by, at least
    #[arg(long, default_value_t = 5)]
    min_jump: u64,
}

/// Merge the config file (if any) with command-line overrides.
fn build_raw_config(args: &RunArgs) -> Result<RawConfig> {
    let mut raw = match &args.config {
        Some(path) => config::load_raw(path)
            .with_context(|| format!("Failed to load config from '{}'", path.display()))?,
        None => RawConfig::new(),
    };

    let overrides = [
        (TARGET_KEY, &args.target),
        (IP_KEY, &args.ip),
        (UNAVAILABLE_SECONDS_KEY, &args.unavailable_seconds),
        (AVAILABLE_SECONDS_KEY, &args.available_seconds),
        (RUNTIME_KEY, &args.runtime),
    ];
    for (key, value) in overrides {
        if let Some(value) = value {
            raw.insert(key.to_string(), value.clone());
        }
    }

    Ok(raw)
}

async fn run(args: &RunArgs) -> Result<()> {
    let raw = build_raw_config(args)?;
    let config = DropperConfig::from_map(&raw).context("Invalid dropper configuration")?;

    let executor = ContainerExecutor::from_config(&config);
    let cycler = AvailabilityCycler::new(config, executor, TokioSleeper, StatusLine::new());

    match cycler.run().await {
        Ok(never) => match never {},
        Err(err) => Err(anyhow::Error::new(err).context("Dropper stopped")),
    }
}

async fn time_check(args: &TimeCheckArgs) -> Result<()> {
    let check = TimeCheck {
        samples: args.samples,
        interval: Duration::from_secs(args.interval),
        min_jump: Duration::from_secs(args.min_jump),
    };

    check
        .run(&SystemClock, &TokioSleeper)
        .await
        .context("Clock check failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Run(args) => run(args).await,
        Command::TimeCheck(args) => time_check(args).await,
    }
}
