//! Container-backed rule executor
//!
//! Runs the commands from `rules::command` as subprocesses, streaming their
//! output to the terminal and failing on a non-zero exit.

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command as TokioCommand;

use super::command::{build_block_command, build_ensure_command, build_unblock_command, describe};
use super::RuleExecutor;
use crate::config::DropperConfig;
use crate::error::CommandError;

/// Captured result of a finished process
#[derive(Debug)]
pub struct CommandOutput {
    /// Captured stdout output
    pub stdout: String,
    /// Captured stderr output
    pub stderr: String,
    /// Process exit code (None if killed by signal)
    pub exit_code: Option<i32>,
}

/// Executes rules inside a container through `<runtime> exec`
#[derive(Debug, Clone)]
pub struct ContainerExecutor {
    runtime: String,
}

impl ContainerExecutor {
    /// Create an executor driving the given runtime binary (e.g. `docker`)
    #[must_use]
    pub fn new(runtime: impl Into<String>) -> Self {
        Self {
            runtime: runtime.into(),
        }
    }

    /// Create an executor for the runtime named in the configuration
    #[must_use]
    pub fn from_config(config: &DropperConfig) -> Self {
        Self::new(config.runtime.clone())
    }

    /// The runtime binary this executor invokes
    #[must_use]
    pub fn runtime(&self) -> &str {
        &self.runtime
    }
}

#[async_trait]
impl RuleExecutor for ContainerExecutor {
    async fn ensure_capability(&self, target: &str) -> Result<(), CommandError> {
        run_checked(build_ensure_command(&self.runtime, target)).await
    }

    async fn block(&self, target: &str, destination: &str) -> Result<(), CommandError> {
        run_checked(build_block_command(&self.runtime, target, destination)).await
    }

    async fn unblock(&self, target: &str, destination: &str) -> Result<(), CommandError> {
        run_checked(build_unblock_command(&self.runtime, target, destination)).await
    }
}

/// Run a command and turn a non-zero exit into an error.
async fn run_checked(cmd: std::process::Command) -> Result<(), CommandError> {
    let command = describe(&cmd);
    let output = run_command(cmd).await?;

    if output.exit_code == Some(0) {
        Ok(())
    } else {
        Err(CommandError::Exited {
            command,
            exit_code: output.exit_code,
            stderr: output.stderr,
        })
    }
}

/// Run a command, streaming output to terminal and capturing it.
///
/// Spawns the process with piped stdout/stderr, reads them concurrently,
/// forwards each line to the terminal, and returns the captured output.
pub async fn run_command(cmd: std::process::Command) -> Result<CommandOutput, CommandError> {
    let command = describe(&cmd);
    let program = cmd.get_program().to_string_lossy().into_owned();

    let mut tokio_cmd = TokioCommand::from(cmd);
    tokio_cmd.stdin(Stdio::null());
    tokio_cmd.stdout(Stdio::piped());
    tokio_cmd.stderr(Stdio::piped());

    let mut child = tokio_cmd
        .spawn()
        .map_err(|source| CommandError::Spawn { program, source })?;

    let io_error = |source: io::Error| CommandError::Io {
        command: command.clone(),
        source,
    };

    let child_stdout = child
        .stdout
        .take()
        .ok_or_else(|| io_error(io::Error::other("stdout not captured")))?;
    let child_stderr = child
        .stderr
        .take()
        .ok_or_else(|| io_error(io::Error::other("stderr not captured")))?;

    let stdout_handle = tokio::spawn(forward_lines(child_stdout, |line| println!("{line}")));
    let stderr_handle = tokio::spawn(forward_lines(child_stderr, |line| eprintln!("{line}")));

    let status = child.wait().await.map_err(io_error)?;
    let stdout = stdout_handle
        .await
        .map_err(|e| io_error(io::Error::other(e)))?;
    let stderr = stderr_handle
        .await
        .map_err(|e| io_error(io::Error::other(e)))?;

    Ok(CommandOutput {
        stdout,
        stderr,
        exit_code: status.code(),
    })
}

/// Read lines until EOF, echoing each one and returning them joined.
///
/// Lines are decoded lossily so a stray non-UTF-8 byte does not stop the
/// reader; the pipe is drained until the child closes it.
async fn forward_lines<R, F>(stream: R, echo: F) -> String
where
    R: AsyncRead + Unpin,
    F: Fn(&str),
{
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::new();
    let mut captured = String::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(_) => {}
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        echo(line);
        if !captured.is_empty() {
            captured.push('\n');
        }
        captured.push_str(line);
    }
    captured
}
