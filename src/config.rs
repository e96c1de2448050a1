//! Dropper configuration
//!
//! Configuration arrives as a string-keyed mapping (`target`, `ip`,
//! `unavailable_seconds`, `available_seconds`, `runtime`), either from the
//! `[dropper]` table of a TOML file, from command-line flags, or both.
//! `DropperConfig::from_map` validates it into a fixed, immutable record.

use std::collections::BTreeMap;
use std::fmt;
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::DropperError;

/// Key holding the target container or host name
pub const TARGET_KEY: &str = "target";
/// Key holding the destination address
pub const IP_KEY: &str = "ip";
/// Key holding the blocked phase length in seconds
pub const UNAVAILABLE_SECONDS_KEY: &str = "unavailable_seconds";
/// Key holding the available phase length in seconds
pub const AVAILABLE_SECONDS_KEY: &str = "available_seconds";
/// Key holding the container runtime binary
pub const RUNTIME_KEY: &str = "runtime";

/// Default length of each phase, in seconds
pub const DEFAULT_PHASE_SECS: u64 = 10;
/// Default container runtime
pub const DEFAULT_RUNTIME: &str = "docker";

/// Unvalidated configuration mapping
pub type RawConfig = BTreeMap<String, String>;

/// On-disk layout: everything of interest lives under `[dropper]`
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    dropper: BTreeMap<String, toml::Value>,
}

/// Read the `[dropper]` table of a TOML file into a raw mapping
pub fn load_raw<P: AsRef<Path>>(path: P) -> Result<RawConfig, DropperError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        DropperError::config(format!(
            "Failed to read config file {}: {e}",
            path.display()
        ))
    })?;
    parse_raw(&content)
}

/// Parse TOML content into a raw mapping.
///
/// Scalars are stringified (`10` becomes `"10"`); arrays and tables are rejected.
pub fn parse_raw(content: &str) -> Result<RawConfig, DropperError> {
    let file: ConfigFile = toml::from_str(content)
        .map_err(|e| DropperError::config(format!("Failed to parse config: {e}")))?;

    file.dropper
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                toml::Value::String(s) => s,
                toml::Value::Integer(i) => i.to_string(),
                toml::Value::Float(f) => f.to_string(),
                toml::Value::Boolean(b) => b.to_string(),
                toml::Value::Datetime(d) => d.to_string(),
                toml::Value::Array(_) | toml::Value::Table(_) => {
                    return Err(DropperError::config(format!(
                        "'{key}' must be a single value"
                    )));
                }
            };
            Ok((key, value))
        })
        .collect()
}

/// Validated dropper configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropperConfig {
    /// Container (or host) the rule is applied on
    pub target: String,
    /// Address whose traffic is dropped, optionally in CIDR form
    pub destination: String,
    /// How long the destination stays blocked per cycle
    pub unavailable_duration: Duration,
    /// How long the destination stays reachable per cycle
    pub available_duration: Duration,
    /// Container runtime binary used to reach the target
    pub runtime: String,
}

impl DropperConfig {
    /// Validate a raw mapping.
    ///
    /// Unknown keys are ignored.
    pub fn from_map(raw: &RawConfig) -> Result<Self, DropperError> {
        let target = required(raw, TARGET_KEY)?;
        if target.starts_with('-') {
            return Err(DropperError::config(format!(
                "'{TARGET_KEY}' cannot start with '-', got '{target}'"
            )));
        }
        let destination = required(raw, IP_KEY)?;
        validate_destination(&destination)?;

        let unavailable_secs = optional_seconds(raw, UNAVAILABLE_SECONDS_KEY)?;
        let available_secs = optional_seconds(raw, AVAILABLE_SECONDS_KEY)?;

        let runtime = match raw.get(RUNTIME_KEY).map(|r| r.trim()) {
            None => DEFAULT_RUNTIME.to_string(),
            Some("") => {
                return Err(DropperError::config(format!("'{RUNTIME_KEY}' cannot be empty")));
            }
            Some(r) => r.to_string(),
        };

        Ok(Self {
            target,
            destination,
            unavailable_duration: Duration::from_secs(unavailable_secs),
            available_duration: Duration::from_secs(available_secs),
            runtime,
        })
    }
}

impl fmt::Display for DropperConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "target={} ip={} unavailable_seconds={} available_seconds={} runtime={}",
            self.target,
            self.destination,
            self.unavailable_duration.as_secs(),
            self.available_duration.as_secs(),
            self.runtime
        )
    }
}

fn required(raw: &RawConfig, key: &str) -> Result<String, DropperError> {
    match raw.get(key).map(|v| v.trim()) {
        Some(value) if !value.is_empty() => Ok(value.to_string()),
        Some(_) => Err(DropperError::config(format!("'{key}' cannot be empty"))),
        None => Err(DropperError::config(format!("Missing required key '{key}'"))),
    }
}

fn optional_seconds(raw: &RawConfig, key: &str) -> Result<u64, DropperError> {
    raw.get(key)
        .map_or(Ok(DEFAULT_PHASE_SECS), |value| parse_seconds(key, value))
}

/// Parse a whole number of seconds. Decimals are truncated, never rounded.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_seconds(key: &str, value: &str) -> Result<u64, DropperError> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(secs);
    }

    match value.parse::<f64>() {
        Ok(secs) if secs.is_finite() && secs >= 0.0 => Ok(secs.trunc() as u64),
        Ok(_) => Err(DropperError::config(format!(
            "'{key}' must be a non-negative number of seconds, got '{value}'"
        ))),
        Err(_) => Err(DropperError::config(format!(
            "'{key}' must be numeric, got '{value}'"
        ))),
    }
}

/// Accept an IP address, optionally followed by `/prefix`.
///
/// The destination ends up inside a `bash -c` string on the target, so
/// nothing else is let through.
fn validate_destination(destination: &str) -> Result<(), DropperError> {
    let invalid = || {
        DropperError::config(format!(
            "'{IP_KEY}' must be an IP address or CIDR block, got '{destination}'"
        ))
    };

    let (addr, prefix) = match destination.split_once('/') {
        Some((addr, prefix)) => (addr, Some(prefix)),
        None => (destination, None),
    };

    let addr: IpAddr = addr.parse().map_err(|_| invalid())?;

    if let Some(prefix) = prefix {
        let prefix: u8 = prefix.parse().map_err(|_| invalid())?;
        let max = if addr.is_ipv4() { 32 } else { 128 };
        if prefix > max {
            return Err(invalid());
        }
    }

    Ok(())
}
