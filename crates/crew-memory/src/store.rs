use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use crew_core::{CrewError, ProjectId, Role};
use serde::{Deserialize, Serialize};

const MEMORY_SUFFIX: &str = "_memory.md";
const TASKS_SUFFIX: &str = "_tasks.md";
const PROJECT_FILE: &str = "project.toml";

/// Metadata written when a project is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectMeta {
    pub id: ProjectId,
    pub working_dir: PathBuf,
    pub created_at: DateTime<Utc>,
}

/// Every memory and task record of one project, keyed by role name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProjectStatus {
    pub memories: BTreeMap<String, String>,
    pub tasks: BTreeMap<String, String>,
}

/// File-backed memory and task records under `<root>/<project_id>/`.
///
/// Memory files are transcripts and only ever grow; task files hold the
/// current list and are replaced wholesale.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    root: PathBuf,
}

impl MemoryStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.root.join(project.as_str())
    }

    pub fn memory_path(&self, role: Role, project: &ProjectId) -> PathBuf {
        self.project_dir(project)
            .join(format!("{}{MEMORY_SUFFIX}", role.as_str()))
    }

    pub fn tasks_path(&self, role: Role, project: &ProjectId) -> PathBuf {
        self.project_dir(project)
            .join(format!("{}{TASKS_SUFFIX}", role.as_str()))
    }

    /// Memory transcript for `role`, or `""` when none was written yet.
    pub fn read_memory(&self, role: Role, project: &ProjectId) -> Result<String> {
        read_or_empty(&self.memory_path(role, project))
    }

    /// Append `text` verbatim to the role's transcript.
    pub fn append_memory(&self, role: Role, project: &ProjectId, text: &str) -> Result<()> {
        let path = self.memory_path(role, project);
        self.ensure_project_dir(project)?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&path)
            .with_context(|| format!("failed to open memory file: {}", path.display()))?;
        file.write_all(text.as_bytes())
            .with_context(|| format!("failed to append memory: {}", path.display()))?;
        file.flush().context("failed to flush memory append")?;
        tracing::debug!(%role, project = %project, bytes = text.len(), "Appended memory");
        Ok(())
    }

    /// Current task list for `role`, or `""` when none was written yet.
    pub fn read_tasks(&self, role: Role, project: &ProjectId) -> Result<String> {
        read_or_empty(&self.tasks_path(role, project))
    }

    /// Replace the role's task list (temp file + rename).
    pub fn replace_tasks(&self, role: Role, project: &ProjectId, text: &str) -> Result<()> {
        self.ensure_project_dir(project)?;
        atomic_write(&self.tasks_path(role, project), text.as_bytes())?;
        tracing::debug!(%role, project = %project, bytes = text.len(), "Replaced task list");
        Ok(())
    }

    pub fn save_project(&self, meta: &ProjectMeta) -> Result<()> {
        self.ensure_project_dir(&meta.id)?;
        let content = toml::to_string(meta).context("failed to serialize project metadata")?;
        atomic_write(&self.project_dir(&meta.id).join(PROJECT_FILE), content.as_bytes())
    }

    /// `None` for projects created before metadata existed or never created.
    pub fn load_project(&self, project: &ProjectId) -> Result<Option<ProjectMeta>> {
        let path = self.project_dir(project).join(PROJECT_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let meta = toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok(Some(meta))
    }

    /// Dump every memory and task record of `project`.
    ///
    /// Unknown projects are a [`CrewError::Validation`].
    pub fn project_status(&self, project: &ProjectId) -> Result<ProjectStatus> {
        let dir = self.project_dir(project);
        if !dir.is_dir() {
            return Err(CrewError::Validation(format!("Unknown project: {project}")).into());
        }

        let mut status = ProjectStatus::default();
        let entries =
            fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))?;
        for entry in entries {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            let slot = if let Some(role) = name.strip_suffix(MEMORY_SUFFIX) {
                Some((&mut status.memories, role))
            } else {
                name.strip_suffix(TASKS_SUFFIX)
                    .map(|role| (&mut status.tasks, role))
            };
            if let Some((map, role)) = slot {
                let content = fs::read_to_string(entry.path())
                    .with_context(|| format!("failed to read {}", entry.path().display()))?;
                map.insert(role.to_string(), content);
            }
        }
        Ok(status)
    }

    fn ensure_project_dir(&self, project: &ProjectId) -> Result<()> {
        let dir = self.project_dir(project);
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create project dir: {}", dir.display()))
    }
}

fn read_or_empty(path: &Path) -> Result<String> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}

pub(crate) fn atomic_write(target: &Path, data: &[u8]) -> Result<()> {
    let parent = target.parent().context("Target path has no parent")?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(data).context("Failed to write temp file")?;
    tmp.persist(target)
        .with_context(|| format!("Failed to persist to {}", target.display()))?;
    Ok(())
}
