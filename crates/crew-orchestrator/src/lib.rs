//! Orchestration engine: routes agent events between roles, runs the QA
//! bug-fix cycle and keeps every role's memory up to date.

pub mod compose;
pub mod context;
pub mod intent;
pub mod prompts;
pub mod qa_loop;
pub mod router;

#[cfg(test)]
mod test_support;

pub use context::{Crew, ProjectScope};
pub use intent::Intent;
pub use qa_loop::{BugCycleState, BugReport, QaLoopOutcome};
pub use router::{AgentEvent, EventOutcome, PromptOutcome, RouteDecision, decide};
