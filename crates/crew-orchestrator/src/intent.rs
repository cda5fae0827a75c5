use clap::ValueEnum;
use crew_executor::{ResultStatus, StructuredResult};
use serde::{Deserialize, Serialize};

/// What a message or reply announces.
///
/// Callers may tag events explicitly; untagged text falls back to the
/// marker phrases the role prompts ask agents to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Intent {
    TaskCompleted,
    BugDetected,
    NewTask,
}

impl Intent {
    pub fn marker(&self) -> &'static str {
        match self {
            Self::TaskCompleted => "tâche terminée",
            Self::BugDetected => "bug détecté",
            Self::NewTask => "nouvelle tâche",
        }
    }

    /// Case-insensitive marker search.
    pub fn mentioned_in(&self, text: &str) -> bool {
        text.to_lowercase().contains(self.marker())
    }

    /// An explicit tag decides alone; without one the text is searched.
    pub fn signalled(&self, text: &str, explicit: Option<Intent>) -> bool {
        match explicit {
            Some(tagged) => tagged == *self,
            None => self.mentioned_in(text),
        }
    }
}

/// Whether a QA reply reports a bug: its status tag when present, else the
/// marker phrase.
pub fn reports_bug(reply: &StructuredResult) -> bool {
    match reply.status {
        Some(status) => status == ResultStatus::BugDetected,
        None => Intent::BugDetected.mentioned_in(&reply.text),
    }
}
