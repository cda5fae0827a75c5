use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use crew_core::Role;

/// Role instruction templates read from `<dir>/<role>.md`.
///
/// Each template is loaded on first use and kept for the lifetime of the
/// owning [`crate::Crew`].
#[derive(Debug)]
pub struct RolePrompts {
    dir: PathBuf,
    cache: RwLock<HashMap<Role, Arc<str>>>,
}

impl RolePrompts {
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, role: Role) -> Result<Arc<str>> {
        if let Some(prompt) = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&role)
        {
            return Ok(Arc::clone(prompt));
        }

        let path = self.dir.join(format!("{}.md", role.as_str()));
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read role prompt: {}", path.display()))?;
        let prompt: Arc<str> = Arc::from(text);
        self.cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(role, Arc::clone(&prompt));
        tracing::debug!(%role, path = %path.display(), "Loaded role prompt");
        Ok(prompt)
    }
}
