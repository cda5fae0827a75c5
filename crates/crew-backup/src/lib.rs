//! Role-tagged snapshots of a project working tree.
//!
//! Layout: `<root>/<project_id>/<role>_<YYYY-MM-DDTHH-MM-SS-mmmZ>[-NNN]/`.
//! Names sort chronologically, so the latest snapshot for a role is the
//! lexicographically greatest name carrying the `<role>_` prefix.
//!
//! A snapshot is copied under `.partial-<name>` and renamed into place once
//! complete, so listings never see a half-written tree.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use crew_core::{CrewError, ProjectId, Role};
use serde::Serialize;
use tracing::{info, warn};

mod tree;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupSnapshot {
    pub project_id: ProjectId,
    pub role: Role,
    /// Directory name, e.g. `frontend_developer_2024-05-02T10-11-12-345Z`.
    pub name: String,
    pub path: PathBuf,
}

impl BackupSnapshot {
    /// Timestamp part of the name (including any collision suffix).
    pub fn timestamp(&self) -> &str {
        self.name
            .strip_prefix(self.role.as_str())
            .and_then(|rest| rest.strip_prefix('_'))
            .unwrap_or(&self.name)
    }
}

const STAGING_PREFIX: &str = ".partial-";

#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
    preserved: Vec<PathBuf>,
}

impl BackupManager {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            preserved: Vec::new(),
        }
    }

    /// Leave `path` out of snapshots and untouched by restores when it sits
    /// inside a working directory (the crew's own data dir, typically).
    pub fn preserve(mut self, path: impl Into<PathBuf>) -> Self {
        self.preserved.push(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn project_dir(&self, project: &ProjectId) -> PathBuf {
        self.root.join(project.as_str())
    }

    /// Copy the whole `working_dir` into a new snapshot tagged with `role`.
    ///
    /// The backup root and preserved paths are skipped when they live inside
    /// `working_dir`. A failed copy leaves no snapshot behind.
    pub fn create_backup(
        &self,
        project: &ProjectId,
        role: Role,
        working_dir: &Path,
    ) -> Result<BackupSnapshot, CrewError> {
        self.try_create(project, role, working_dir)
            .map_err(|err| CrewError::Backup(format!("{err:#}")))
    }

    /// Replace the contents of `working_dir` with the latest snapshot tagged
    /// with `role`. Files created after that snapshot are removed; the backup
    /// root and preserved paths are kept as they are.
    pub fn restore_latest(
        &self,
        project: &ProjectId,
        role: Role,
        working_dir: &Path,
    ) -> Result<BackupSnapshot, CrewError> {
        let snapshot = self
            .latest(project, role)
            .map_err(|err| CrewError::Backup(format!("{err:#}")))?
            .ok_or_else(|| CrewError::NoBackup {
                project_id: project.to_string(),
                role,
            })?;

        self.try_restore(&snapshot, working_dir)
            .map_err(|err| CrewError::Backup(format!("{err:#}")))?;
        info!(
            project = %project,
            %role,
            snapshot = %snapshot.name,
            working_dir = %working_dir.display(),
            "Restored backup"
        );
        Ok(snapshot)
    }

    /// Latest snapshot for `role`, if any.
    pub fn latest(&self, project: &ProjectId, role: Role) -> Result<Option<BackupSnapshot>> {
        Ok(self
            .list_backups(project)?
            .into_iter()
            .find(|snapshot| snapshot.role == role))
    }

    /// All snapshots of `project`, newest name first.
    pub fn list_backups(&self, project: &ProjectId) -> Result<Vec<BackupSnapshot>> {
        let dir = self.project_dir(project);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut snapshots = Vec::new();
        for entry in
            fs::read_dir(&dir).with_context(|| format!("failed to list {}", dir.display()))?
        {
            let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
            if !entry.file_type().is_ok_and(|kind| kind.is_dir()) {
                continue;
            }
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if let Some(role) = role_of(&name) {
                snapshots.push(BackupSnapshot {
                    project_id: project.clone(),
                    role,
                    name,
                    path: entry.path(),
                });
            }
        }
        snapshots.sort_by(|a, b| b.name.cmp(&a.name));
        Ok(snapshots)
    }

    fn try_create(
        &self,
        project: &ProjectId,
        role: Role,
        working_dir: &Path,
    ) -> Result<BackupSnapshot> {
        let source = working_dir
            .canonicalize()
            .with_context(|| format!("working directory {} unavailable", working_dir.display()))?;
        let project_dir = self.project_dir(project);
        fs::create_dir_all(&project_dir)
            .with_context(|| format!("failed to create {}", project_dir.display()))?;
        let protected = self.protected_paths();

        let stamp = Utc::now().format("%Y-%m-%dT%H-%M-%S-%3fZ").to_string();
        let base = format!("{}_{stamp}", role.as_str());
        let (name, staging) = reserve_name(&project_dir, &base)?;
        let path = project_dir.join(&name);

        let staged = tree::copy_tree(&source, &staging, &protected).and_then(|()| {
            fs::rename(&staging, &path)
                .with_context(|| format!("failed to finalize {}", path.display()))
        });
        if let Err(err) = staged {
            if let Err(cleanup) = fs::remove_dir_all(&staging) {
                warn!(path = %staging.display(), error = %cleanup, "Failed to remove partial backup");
            }
            return Err(err);
        }

        info!(project = %project, %role, snapshot = %name, "Created backup");
        Ok(BackupSnapshot {
            project_id: project.clone(),
            role,
            name,
            path,
        })
    }

    fn try_restore(&self, snapshot: &BackupSnapshot, working_dir: &Path) -> Result<()> {
        let target = working_dir
            .canonicalize()
            .with_context(|| format!("working directory {} unavailable", working_dir.display()))?;
        tree::clear_dir(&target, &self.protected_paths())?;
        tree::copy_tree(&snapshot.path, &target, &[])
    }

    /// Backup root plus preserved paths, resolved. Paths that do not exist
    /// yet cannot be inside a tree and are dropped.
    fn protected_paths(&self) -> Vec<PathBuf> {
        std::iter::once(&self.root)
            .chain(&self.preserved)
            .filter_map(|path| path.canonicalize().ok())
            .collect()
    }
}

/// Pick a free snapshot name (`<base>`, or `<base>-NNN` when a snapshot was
/// already taken in the same millisecond) and create its staging directory.
///
/// Returns the final name and the staging path.
fn reserve_name(dir: &Path, base: &str) -> Result<(String, PathBuf)> {
    let mut name = base.to_string();
    let mut suffix = 1u32;
    loop {
        let staging = dir.join(format!("{STAGING_PREFIX}{name}"));
        if !dir.join(&name).exists() {
            match fs::create_dir(&staging) {
                Ok(()) => return Ok((name, staging)),
                Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("failed to create {}", staging.display()));
                }
            }
        }
        name = format!("{base}-{suffix:03}");
        suffix += 1;
    }
}

fn role_of(name: &str) -> Option<Role> {
    Role::ALL.into_iter().find(|role| {
        name.strip_prefix(role.as_str())
            .is_some_and(|rest| rest.starts_with('_'))
    })
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
