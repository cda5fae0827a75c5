use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use walkdir::WalkDir;

/// Recursively copy `source` into `dest`, skipping every `exclude` path (and
/// everything below it). Symlinks are recreated, not followed.
pub(crate) fn copy_tree(source: &Path, dest: &Path, exclude: &[PathBuf]) -> Result<()> {
    fs::create_dir_all(dest).with_context(|| format!("failed to create {}", dest.display()))?;

    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| !exclude.iter().any(|skip| entry.path().starts_with(skip)));

    for entry in walker {
        let entry = entry.with_context(|| format!("failed to walk {}", source.display()))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .context("walked entry outside source tree")?;
        let target = dest.join(relative);
        let kind = entry.file_type();

        if kind.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("failed to create {}", target.display()))?;
        } else if kind.is_symlink() {
            let link = fs::read_link(entry.path())
                .with_context(|| format!("failed to read link {}", entry.path().display()))?;
            std::os::unix::fs::symlink(&link, &target)
                .with_context(|| format!("failed to create link {}", target.display()))?;
        } else {
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
        }
    }
    Ok(())
}

/// Remove every entry of `dir` except the `keep` paths (and the directories
/// leading down to them).
pub(crate) fn clear_dir(dir: &Path, keep: &[PathBuf]) -> Result<()> {
    for entry in fs::read_dir(dir).with_context(|| format!("failed to list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("failed to list {}", dir.display()))?;
        let path = entry.path();
        if keep.contains(&path) {
            continue;
        }
        if keep.iter().any(|kept| kept.starts_with(&path)) {
            // a kept path lives below this directory: prune around it.
            clear_dir(&path, keep)?;
            continue;
        }
        let kind = entry
            .file_type()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        if kind.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        }
        .with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}
