use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::{info, warn};

/// Raised by [`crate::run_with_timeout`] when the run was stopped through
/// [`ProcessRegistry::terminate_all`]. Callers should not retry it.
#[derive(Debug, thiserror::Error)]
#[error("Tool process was terminated on request")]
pub struct Terminated;

#[derive(Default)]
struct RegistryState {
    live: HashSet<u32>,
    terminated: HashSet<u32>,
}

/// Live tool subprocesses started by this orchestrator instance.
///
/// Cloning shares the same set.
#[derive(Clone, Default)]
pub struct ProcessRegistry {
    state: Arc<Mutex<RegistryState>>,
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track `pid` until the returned guard is dropped.
    pub fn track(&self, pid: u32) -> ProcessGuard {
        self.lock().live.insert(pid);
        ProcessGuard {
            registry: self.clone(),
            pid,
        }
    }

    pub fn live_count(&self) -> usize {
        self.lock().live.len()
    }

    /// SIGTERM every tracked process group. Returns how many were signalled.
    pub fn terminate_all(&self) -> usize {
        let mut state = self.lock();
        let pids: Vec<u32> = state.live.iter().copied().collect();
        for pid in &pids {
            kill_process_group(*pid, libc::SIGTERM);
            state.terminated.insert(*pid);
        }
        if !pids.is_empty() {
            info!(count = pids.len(), "Terminated live tool processes");
        }
        pids.len()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Removes its pid from the registry on drop.
pub struct ProcessGuard {
    registry: ProcessRegistry,
    pid: u32,
}

impl ProcessGuard {
    pub fn was_terminated(&self) -> bool {
        self.registry.lock().terminated.contains(&self.pid)
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        let mut state = self.registry.lock();
        state.live.remove(&self.pid);
        state.terminated.remove(&self.pid);
    }
}

/// Send `signal` to the process group led by `pid` (children are spawned with
/// `setsid`, so the group id equals the pid).
pub fn kill_process_group(pid: u32, signal: i32) {
    let Ok(pgid) = i32::try_from(pid) else {
        return;
    };
    // SAFETY: kill() has no memory-safety preconditions; a negative pid
    // targets the whole process group.
    let rc = unsafe { libc::kill(-pgid, signal) };
    if rc != 0 {
        warn!(pid, signal, "Failed to signal process group (already exited?)");
    }
}

/// `pkill -f <pattern>` for processes this instance does not track (e.g. a
/// server started by another `crew` process).
///
/// Returns `false` when nothing matched.
pub async fn terminate_by_name(pattern: &str) -> Result<bool> {
    let status = Command::new("pkill")
        .arg("-f")
        .arg(pattern)
        .status()
        .await
        .context("Failed to execute 'pkill'")?;
    match status.code() {
        Some(0) => Ok(true),
        Some(1) => Ok(false),
        code => anyhow::bail!("pkill -f {pattern} failed with status {code:?}"),
    }
}
