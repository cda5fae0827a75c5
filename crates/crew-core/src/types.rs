use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::CrewError;

/// Agent role participating in a project.
///
/// The snake_case name doubles as the file-name namespace for memory, task
/// and backup records, so it must stay stable.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Role {
    ProjectManager,
    FrontendDeveloper,
    BackendDeveloper,
    Qa,
    ProductOwner,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::ProjectManager,
        Role::FrontendDeveloper,
        Role::BackendDeveloper,
        Role::Qa,
        Role::ProductOwner,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProjectManager => "project_manager",
            Self::FrontendDeveloper => "frontend_developer",
            Self::BackendDeveloper => "backend_developer",
            Self::Qa => "qa",
            Self::ProductOwner => "product_owner",
        }
    }

    pub fn is_developer(&self) -> bool {
        matches!(self, Self::FrontendDeveloper | Self::BackendDeveloper)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                CrewError::Validation(format!(
                    "Invalid role '{s}'. Valid: project_manager, frontend_developer, \
                     backend_developer, qa, product_owner"
                ))
            })
    }
}

const PROJECT_ID_MAX_LEN: usize = 64;

/// Opaque project identifier.
///
/// Fresh ids are ULIDs (millisecond timestamp + 80 random bits). Parsed ids
/// only need to be short and alphanumeric, which keeps them safe to use as a
/// directory name.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    pub fn new() -> Self {
        Self(ulid::Ulid::new().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, CrewError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CrewError::Validation("Project ID is required".into()));
        }
        if trimmed.len() > PROJECT_ID_MAX_LEN
            || !trimmed.chars().all(|c| c.is_ascii_alphanumeric())
        {
            return Err(CrewError::Validation(format!(
                "Invalid project ID '{trimmed}': expected up to {PROJECT_ID_MAX_LEN} alphanumeric characters"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ProjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ProjectId {
    type Err = CrewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProjectId {
    type Error = CrewError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

/// Output format for CLI responses
#[derive(Clone, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
