use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use crew_config::ToolConfig;
use crew_process::{ExecutionResult, ProcessRegistry, run_with_timeout};
use tokio::process::Command;

/// Seam between the executor and the subprocess that answers prompts.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run the tool once for `prompt`, optionally inside `work_dir`.
    ///
    /// Spawn failures and timeouts are errors; a non-zero exit is returned as
    /// a result for the caller to judge.
    async fn execute(&self, prompt: &str, work_dir: Option<&Path>) -> Result<ExecutionResult>;
}

/// Runs `<executable> <args...> <prompt>` as a child process.
///
/// The API credential reaches the tool through the inherited environment.
#[derive(Clone)]
pub struct CliTransport {
    executable: String,
    args: Vec<String>,
    timeout: Duration,
    registry: ProcessRegistry,
}

impl CliTransport {
    pub fn new(tool: &ToolConfig, registry: ProcessRegistry) -> Self {
        Self {
            executable: tool.executable.clone(),
            args: tool.args.clone(),
            timeout: tool.timeout(),
            registry,
        }
    }

    pub fn registry(&self) -> &ProcessRegistry {
        &self.registry
    }

    fn build_command(&self, prompt: &str, work_dir: Option<&Path>) -> Command {
        let mut cmd = Command::new(&self.executable);
        cmd.args(&self.args).arg(prompt);
        if let Some(dir) = work_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait]
impl Transport for CliTransport {
    async fn execute(&self, prompt: &str, work_dir: Option<&Path>) -> Result<ExecutionResult> {
        tracing::debug!(
            executable = %self.executable,
            prompt_chars = prompt.chars().count(),
            work_dir = ?work_dir,
            "Invoking tool"
        );
        let cmd = self.build_command(prompt, work_dir);
        run_with_timeout(cmd, self.timeout, Some(&self.registry)).await
    }
}
