use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crew_config::ToolConfig;
use crew_core::CrewError;
use crew_process::{ProcessRegistry, Terminated, failure_summary};
use tracing::{error, info, warn};

use crate::result::{StructuredResult, parse_result};
use crate::transport::{CliTransport, Transport};

/// Fixed-delay retry budget for tool invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay between attempts (no jitter).
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(tool: &ToolConfig) -> Self {
        Self {
            max_retries: tool.max_retries,
            backoff: tool.retry_delay(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ToolConfig::default())
    }
}

/// Runs prompts through a [`Transport`] with bounded retries.
///
/// Spawn errors, timeouts and non-zero exits are retried after a fixed
/// backoff. A reply that is not valid JSON fails immediately with
/// [`CrewError::InvalidResponse`]; retries may repeat tool side effects.
#[derive(Clone)]
pub struct InvocationExecutor {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl InvocationExecutor {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Executor backed by the configured CLI tool.
    pub fn from_config(tool: &ToolConfig, registry: ProcessRegistry) -> Self {
        Self::new(
            Arc::new(CliTransport::new(tool, registry)),
            RetryPolicy::from_config(tool),
        )
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Invoke with the configured retry budget.
    pub async fn run(&self, prompt: &str, work_dir: Option<&Path>) -> Result<StructuredResult> {
        self.invoke_in(prompt, work_dir, self.policy.max_retries)
            .await
    }

    pub async fn invoke(&self, prompt: &str, retries_remaining: u32) -> Result<StructuredResult> {
        self.invoke_in(prompt, None, retries_remaining).await
    }

    /// Invoke the tool inside `work_dir`, allowing `retries_remaining` retries.
    ///
    /// Exhausting the budget yields [`CrewError::Invocation`] carrying the total
    /// attempt count and the last failure cause.
    pub async fn invoke_in(
        &self,
        prompt: &str,
        work_dir: Option<&Path>,
        retries_remaining: u32,
    ) -> Result<StructuredResult> {
        let mut remaining = retries_remaining;
        let mut attempts: u32 = 0;

        loop {
            attempts += 1;
            let cause = match self.transport.execute(prompt, work_dir).await {
                Ok(execution) if execution.success() => {
                    let parsed = parse_result(&execution.output)?;
                    if attempts > 1 {
                        info!(attempts, "Tool invocation succeeded after retry");
                    }
                    return Ok(parsed);
                }
                Ok(execution) => failure_summary(
                    &execution.output,
                    &execution.stderr_output,
                    execution.exit_code,
                ),
                Err(err) if err.downcast_ref::<Terminated>().is_some() => return Err(err),
                Err(err) => format!("{err:#}"),
            };

            if remaining == 0 {
                error!(attempts, %cause, "Tool invocation failed, no retries left");
                return Err(CrewError::Invocation { attempts, cause }.into());
            }
            warn!(
                attempt = attempts,
                retries_remaining = remaining,
                %cause,
                "Tool invocation failed, retrying"
            );
            remaining -= 1;
            tokio::time::sleep(self.policy.backoff).await;
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
