//! Process management: spawning, wall-clock timeouts and output capture for
//! the external reasoning tool.

use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

mod output_helpers;
mod registry;

pub use output_helpers::failure_summary;
pub use registry::{ProcessGuard, ProcessRegistry, Terminated, kill_process_group, terminate_by_name};

/// Result of executing a command.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Full stdout output.
    pub output: String,
    /// Captured stderr output.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr_output: String,
    /// Exit code (1 if signal-killed).
    pub exit_code: i32,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawn a tool process without waiting for it to complete.
///
/// Stdout and stderr are piped, stdin is closed, and the child gets its own
/// session so the whole subprocess tree can be signalled as one group.
pub async fn spawn_tool(mut cmd: Command) -> Result<Child> {
    cmd.stdin(std::process::Stdio::null());
    cmd.stdout(std::process::Stdio::piped());
    cmd.stderr(std::process::Stdio::piped());
    cmd.kill_on_drop(true);

    // SAFETY: setsid() is async-signal-safe and runs before exec, so no Rust
    // runtime state exists in the child yet.
    #[cfg(unix)]
    unsafe {
        cmd.pre_exec(|| {
            libc::setsid();
            Ok(())
        });
    }

    cmd.spawn().context("Failed to spawn command")
}

/// Spawn `cmd` and wait for it under a wall-clock `timeout`.
///
/// The child handle is bound before the timer starts, so on expiry exactly
/// that child and its process group are killed. When a registry is given the
/// pid is tracked for the lifetime of the call; a run stopped through
/// [`ProcessRegistry::terminate_all`] fails with [`Terminated`].
pub async fn run_with_timeout(
    cmd: Command,
    timeout: Duration,
    registry: Option<&ProcessRegistry>,
) -> Result<ExecutionResult> {
    let mut child = spawn_tool(cmd).await?;
    let pid = child.id();
    let guard = match (registry, pid) {
        (Some(registry), Some(pid)) => Some(registry.track(pid)),
        _ => None,
    };
    debug!(?pid, timeout_secs = timeout.as_secs(), "Spawned tool process");

    match tokio::time::timeout(timeout, capture(&mut child)).await {
        Ok(result) => {
            if guard.as_ref().is_some_and(ProcessGuard::was_terminated) {
                return Err(Terminated.into());
            }
            result
        }
        Err(_) => {
            if let Some(pid) = pid {
                kill_process_group(pid, libc::SIGKILL);
            }
            let _ = child.kill().await;
            warn!(?pid, timeout_secs = timeout.as_secs(), "Tool process timed out");
            anyhow::bail!("Tool process timed out after {}s", timeout.as_secs())
        }
    }
}

async fn capture(child: &mut Child) -> Result<ExecutionResult> {
    let stdout = child.stdout.take().context("Failed to capture stdout")?;
    let stderr = child.stderr.take().context("Failed to capture stderr")?;

    let mut stdout_reader = BufReader::new(stdout);
    let mut stderr_reader = BufReader::new(stderr);
    let mut output = String::new();
    let mut stderr_output = String::new();
    let mut stdout_line = String::new();
    let mut stderr_line = String::new();
    let mut stdout_done = false;
    let mut stderr_done = false;

    while !stdout_done || !stderr_done {
        tokio::select! {
            result = stdout_reader.read_line(&mut stdout_line), if !stdout_done => {
                match result {
                    Ok(0) | Err(_) => stdout_done = true,
                    Ok(_) => {
                        output.push_str(&stdout_line);
                        stdout_line.clear();
                    }
                }
            }
            result = stderr_reader.read_line(&mut stderr_line), if !stderr_done => {
                match result {
                    Ok(0) | Err(_) => stderr_done = true,
                    Ok(_) => {
                        debug!(line = stderr_line.trim_end(), "tool stderr");
                        stderr_output.push_str(&stderr_line);
                        stderr_line.clear();
                    }
                }
            }
        }
    }

    let status = child.wait().await.context("Failed to wait for command")?;
    let exit_code = status.code().unwrap_or_else(|| {
        warn!("Process terminated by signal, using exit code 1");
        1
    });

    Ok(ExecutionResult {
        output,
        stderr_output,
        exit_code,
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
