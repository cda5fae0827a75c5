//! Per-project, per-role memory transcripts and task lists, project metadata
//! and the shared feature registry.

pub mod features;
pub mod store;

pub use features::{BACKUP_FEATURE, BUG_HANDLING_FEATURE, FeatureRegistry, FeatureStatus};
pub use store::{MemoryStore, ProjectMeta, ProjectStatus};
