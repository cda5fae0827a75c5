//! Shared vocabulary for the crew workspace: roles, project identifiers and
//! the error taxonomy surfaced at the transport boundary.

pub mod error;
pub mod types;

pub use error::CrewError;
pub use types::{OutputFormat, ProjectId, Role};
