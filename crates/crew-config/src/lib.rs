//! Crew configuration loading (config.toml), state paths and working
//! directory validation.

pub mod config;
pub mod paths;
pub mod workdir;

pub use config::{
    CrewConfig, PathsConfig, PermissionsConfig, QaConfig, ServerConfig, ToolConfig,
};
pub use workdir::{absolute_path, ensure_tool_settings, validate_working_dir};
