//! Crew configuration (`~/.config/agent-crew/config.toml`).
//!
//! Every section is optional; a missing file yields the built-in defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths;

const DEFAULT_EXECUTABLE: &str = "claude";
const DEFAULT_API_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const DEFAULT_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
const DEFAULT_MAX_QA_ATTEMPTS: u32 = 3;
const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrewConfig {
    #[serde(default)]
    pub tool: ToolConfig,
    #[serde(default)]
    pub qa: QaConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub permissions: PermissionsConfig,
}

/// `[tool]`: how the external reasoning tool is launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub executable: String,
    /// Arguments placed before the prompt, which is always the last argv entry.
    pub args: Vec<String>,
    /// Environment variable holding the API credential for the tool.
    pub api_key_env: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            executable: DEFAULT_EXECUTABLE.to_string(),
            args: vec![
                "-p".into(),
                "--output-format".into(),
                "json".into(),
                "--verbose".into(),
            ],
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// `[qa]`: bug-fix loop limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    /// Correction attempts allowed before the developer's work is rolled back.
    pub max_attempts: u32,
}

impl Default for QaConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_QA_ATTEMPTS,
        }
    }
}

/// `[paths]`: where state, prompts and the feature registry live.
///
/// Relative `prompts_dir` / `features_file` values resolve against the
/// process working directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Root for `tasks/`, `backups/` and `logs/`. Defaults to the XDG state dir.
    pub data_dir: Option<PathBuf>,
    pub prompts_dir: Option<PathBuf>,
    pub features_file: Option<PathBuf>,
}

impl PathsConfig {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .or_else(paths::state_dir)
            .unwrap_or_else(paths::state_dir_fallback)
    }

    pub fn prompts_dir(&self) -> PathBuf {
        self.prompts_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("prompts"))
    }

    pub fn features_file(&self) -> PathBuf {
        self.features_file
            .clone()
            .unwrap_or_else(|| PathBuf::from("features").join("features.md"))
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.data_dir().join("tasks")
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.data_dir().join("backups")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }
}

/// `[server]`: HTTP transport bind address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// `[permissions]`: tool permission lists written to
/// `<working_dir>/.claude/settings.local.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub allow: Vec<String>,
    pub deny: Vec<String>,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        let allow = [
            "Bash(*)",
            "Bash(ls:*)",
            "Edit(*)",
            "Glob(*)",
            "Grep(*)",
            "LS(*)",
            "NotebookRead(*)",
            "NotebookEdit(*)",
            "Read(*)",
            "WebFetch(*)",
            "Write(*_test.go)",
        ];
        Self {
            allow: allow.iter().map(|s| (*s).to_string()).collect(),
            deny: vec!["Bash(git *:*)".to_string()],
        }
    }
}

impl CrewConfig {
    /// Load config from an explicit path, else from the user config dir.
    ///
    /// An explicit path must exist; the user-level file is optional and
    /// falls back to defaults when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        match Self::user_config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;
        tracing::debug!(path = %path.display(), "Loaded crew config");
        Ok(config)
    }

    pub fn user_config_path() -> Option<PathBuf> {
        paths::config_dir().map(|dir| dir.join("config.toml"))
    }

    /// Fail early when the tool credential is missing from the environment.
    pub fn require_api_key(&self) -> Result<()> {
        match std::env::var(&self.tool.api_key_env) {
            Ok(value) if !value.trim().is_empty() => Ok(()),
            _ => anyhow::bail!(
                "{} is not set; the '{}' tool needs it to authenticate",
                self.tool.api_key_env,
                self.tool.executable
            ),
        }
    }
}
