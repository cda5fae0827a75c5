use std::path::PathBuf;

/// XDG app name used for config and state directories.
pub const APP_NAME: &str = "agent-crew";

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", APP_NAME)
}

/// `~/.config/agent-crew` on Linux.
pub fn config_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
}

/// `~/.local/state/agent-crew` on Linux; platforms without a state dir use
/// the local data dir.
pub fn state_dir() -> Option<PathBuf> {
    project_dirs().map(|dirs| {
        dirs.state_dir()
            .unwrap_or_else(|| dirs.data_local_dir())
            .to_path_buf()
    })
}

/// Used when no home directory can be resolved (e.g. a bare container).
pub fn state_dir_fallback() -> PathBuf {
    PathBuf::from(".").join(".agent-crew")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_use_app_name() {
        if let Some(dir) = config_dir() {
            assert!(dir.ends_with(APP_NAME));
        }
        if let Some(dir) = state_dir() {
            assert!(dir.to_string_lossy().contains(APP_NAME));
        }
    }

    #[test]
    fn test_fallback_is_relative_hidden_dir() {
        assert_eq!(state_dir_fallback(), PathBuf::from("./.agent-crew"));
    }
}
