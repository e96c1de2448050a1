//! Container runtime command builder
//!
//! Constructs `std::process::Command`s that run `iptables` (or `ip6tables`
//! for IPv6 destinations) inside the target container via
//! `<runtime> exec <target> ...`.

use std::process::Command;

/// Chain the drop rule is inserted into
const CHAIN: &str = "OUTPUT";

/// Build the command that installs `iptables` on the target.
///
/// The package ships `ip6tables` too.
#[must_use]
pub fn build_ensure_command(runtime: &str, target: &str) -> Command {
    let mut cmd = exec(runtime, target);
    cmd.args(["apt-get", "install", "iptables", "-y"]);
    cmd
}

/// Build the command that inserts the drop rule unless it is already present.
///
/// `iptables -C` checks for the rule first, so running this twice leaves a
/// single rule in the chain.
#[must_use]
pub fn build_block_command(runtime: &str, target: &str, destination: &str) -> Command {
    let check = rule_spec("-C", destination);
    let insert = rule_spec("-I", destination);
    shell(runtime, target, &format!("{check} || {insert}"))
}

/// Build the command that deletes the drop rule.
#[must_use]
pub fn build_unblock_command(runtime: &str, target: &str, destination: &str) -> Command {
    shell(runtime, target, &rule_spec("-D", destination))
}

/// Render a command line for logs and error messages.
#[must_use]
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| {
            let part = part.to_string_lossy();
            if part.contains(' ') {
                format!("'{part}'")
            } else {
                part.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn rule_spec(action: &str, destination: &str) -> String {
    let binary = firewall_binary(destination);
    format!("{binary} {action} {CHAIN} -d {destination} -j DROP")
}

/// `iptables` only handles IPv4; IPv6 rules live in `ip6tables`.
fn firewall_binary(destination: &str) -> &'static str {
    if destination.contains(':') {
        "ip6tables"
    } else {
        "iptables"
    }
}

fn exec(runtime: &str, target: &str) -> Command {
    let mut cmd = Command::new(runtime);
    cmd.arg("exec").arg(target);
    cmd
}

fn shell(runtime: &str, target: &str, script: &str) -> Command {
    let mut cmd = exec(runtime, target);
    cmd.arg("bash").arg("-c").arg(script);
    cmd
}
