use crate::types::Role;

/// Failures the orchestration core reports to its callers.
///
/// Plumbing errors travel as `anyhow::Error`; these variants are raised where
/// the caller needs to tell failure classes apart (retry policy, HTTP status).
#[derive(thiserror::Error, Debug)]
pub enum CrewError {
    #[error("Tool invocation failed after {attempts} attempt(s): {cause}")]
    Invocation { attempts: u32, cause: String },

    #[error("Invalid response from tool: {0}")]
    InvalidResponse(String),

    #[error("Backup failed: {0}")]
    Backup(String),

    #[error("No backup found for role '{role}' in project {project_id}")]
    NoBackup { project_id: String, role: Role },

    #[error("{0}")]
    Validation(String),
}

impl CrewError {
    /// True for errors caused by the request itself rather than the system.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
