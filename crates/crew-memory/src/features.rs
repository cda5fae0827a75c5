//! Markdown feature registry.
//!
//! ```text
//! ### [Gestion des Bugs]
//! - **Statut**: ✅ Fonctionnelle
//! - **Dernière vérification**: 2024-05-02
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use regex::{NoExpand, Regex};
use tracing::{info, warn};

use crate::store::atomic_write;

pub const BACKUP_FEATURE: &str = "Backup et Restauration";
pub const BUG_HANDLING_FEATURE: &str = "Gestion des Bugs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureStatus {
    Working,
    Broken,
}

impl FeatureStatus {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Working => "✅ Fonctionnelle",
            Self::Broken => "❌ Cassée",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FeatureRegistry {
    path: PathBuf,
}

impl FeatureRegistry {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Registry text, or `""` when the file is absent or unreadable.
    pub fn read(&self) -> String {
        match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "Feature registry unavailable");
                String::new()
            }
        }
    }

    /// Rewrite the status and last-check lines of the `### [name]` section.
    ///
    /// Returns `false` (after a warning) when the registry file or the
    /// section does not exist; nothing else in the file is touched.
    pub fn set_feature_status(
        &self,
        name: &str,
        status: FeatureStatus,
        date: NaiveDate,
    ) -> Result<bool> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.path.display(), feature = name, "Feature registry missing, skipping update");
                return Ok(false);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read {}", self.path.display()));
            }
        };

        let Some(updated) = update_section(&content, name, status.label(), date)? else {
            warn!(feature = name, "Feature section not found in registry");
            return Ok(false);
        };
        atomic_write(&self.path, updated.as_bytes())?;
        info!(feature = name, status = status.label(), %date, "Updated feature status");
        Ok(true)
    }
}

fn update_section(
    content: &str,
    name: &str,
    status: &str,
    date: NaiveDate,
) -> Result<Option<String>> {
    let header = Regex::new(&format!(r"(?m)^###\s*\[{}\]", regex::escape(name)))
        .context("invalid feature header pattern")?;
    let Some(found) = header.find(content) else {
        return Ok(None);
    };
    let body_start = found.end();
    let body_end = content[body_start..]
        .find("###")
        .map_or(content.len(), |offset| body_start + offset);

    let status_line = Regex::new(r"- \*\*Statut\*\*: .*").context("invalid status pattern")?;
    let date_line = Regex::new(r"- \*\*Dernière vérification\*\*: .*")
        .context("invalid date pattern")?;

    let section = &content[body_start..body_end];
    let section = status_line.replace(section, NoExpand(&format!("- **Statut**: {status}")));
    let section = date_line.replace(
        &section,
        NoExpand(&format!("- **Dernière vérification**: {}", date.format("%Y-%m-%d"))),
    );

    let mut out = String::with_capacity(content.len());
    out.push_str(&content[..body_start]);
    out.push_str(&section);
    out.push_str(&content[body_end..]);
    Ok(Some(out))
}
