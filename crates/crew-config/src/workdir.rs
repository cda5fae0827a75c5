//! Project working-directory checks and tool permission settings.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use crew_core::CrewError;
use serde::{Deserialize, Serialize};

use crate::config::PermissionsConfig;

const SETTINGS_DIR: &str = ".claude";
const SETTINGS_FILE: &str = "settings.local.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ToolSettings {
    permissions: PermissionsConfig,
}

/// Validate a project working directory and make sure the tool settings file
/// inside it carries the configured permissions.
///
/// Returns the lexically normalized path. Every failure is reported as
/// [`CrewError::Validation`].
pub fn validate_working_dir(
    raw: &str,
    permissions: &PermissionsConfig,
) -> Result<PathBuf, CrewError> {
    if raw.trim().is_empty() {
        return Err(CrewError::Validation(
            "Working directory is required".into(),
        ));
    }
    let path = Path::new(raw);
    if !path.is_absolute() {
        return Err(CrewError::Validation(format!(
            "Working directory must be an absolute path: {raw}"
        )));
    }
    let clean = normalize(path);

    let metadata = std::fs::metadata(&clean).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => CrewError::Validation(format!(
            "Working directory does not exist: {}",
            clean.display()
        )),
        _ => CrewError::Validation(format!(
            "Cannot inspect working directory {}: {err}",
            clean.display()
        )),
    })?;
    if !metadata.is_dir() {
        return Err(CrewError::Validation(format!(
            "Working directory is not a directory: {}",
            clean.display()
        )));
    }
    if !is_read_writable(&clean) {
        return Err(CrewError::Validation(format!(
            "No read/write permission on working directory: {}",
            clean.display()
        )));
    }

    ensure_tool_settings(&clean, permissions).map_err(|err| {
        CrewError::Validation(format!("Cannot configure tool permissions: {err:#}"))
    })?;
    Ok(clean)
}

/// Write `<dir>/.claude/settings.local.json` when it is missing or differs
/// from `permissions`. Returns true when the file was (re)written.
pub fn ensure_tool_settings(dir: &Path, permissions: &PermissionsConfig) -> anyhow::Result<bool> {
    let settings_dir = dir.join(SETTINGS_DIR);
    std::fs::create_dir_all(&settings_dir)
        .with_context(|| format!("Failed to create {}", settings_dir.display()))?;
    let settings_path = settings_dir.join(SETTINGS_FILE);

    let desired = ToolSettings {
        permissions: permissions.clone(),
    };
    // Unreadable or foreign-shaped content is treated as stale.
    let current = std::fs::read_to_string(&settings_path)
        .ok()
        .and_then(|raw| serde_json::from_str::<ToolSettings>(&raw).ok());
    if current.as_ref() == Some(&desired) {
        return Ok(false);
    }

    let json = serde_json::to_string_pretty(&desired).context("Failed to encode tool settings")?;
    std::fs::write(&settings_path, json)
        .with_context(|| format!("Failed to write {}", settings_path.display()))?;
    tracing::info!(path = %settings_path.display(), "Wrote tool permission settings");
    Ok(true)
}

/// Join `name` onto the process working directory and normalize the result.
pub fn absolute_path(name: &str) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    Ok(normalize(&cwd.join(name)))
}

/// Lexical normalization: drops `.` and resolves `..` without touching the
/// filesystem.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

fn is_read_writable(path: &Path) -> bool {
    use std::os::unix::ffi::OsStrExt;

    let Ok(c_path) = std::ffi::CString::new(path.as_os_str().as_bytes()) else {
        return false;
    };
    // SAFETY: `access` only reads the NUL-terminated path for the call duration.
    unsafe { libc::access(c_path.as_ptr(), libc::R_OK | libc::W_OK) == 0 }
}
