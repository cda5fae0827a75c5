use std::path::PathBuf;

use clap::{Parser, Subcommand};
use crew_core::{OutputFormat, ProjectId, Role};
use crew_orchestrator::Intent;

#[derive(Parser)]
#[command(name = "crew")]
#[command(about = "Agent Crew: multi-role agent orchestrator")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Config file (defaults to ~/.config/agent-crew/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start a new project and hand the request to the project manager
    Prompt {
        /// User request
        prompt: String,

        /// Project working directory (defaults to CWD)
        #[arg(long)]
        dir: Option<String>,
    },

    /// Deliver a message from one role to another
    Event {
        /// Sending role
        #[arg(long, value_enum)]
        from: Role,

        /// Receiving role
        #[arg(long, value_enum)]
        to: Role,

        /// Project ID returned by `crew prompt`
        #[arg(long, value_parser = ProjectId::parse)]
        project: ProjectId,

        /// Message body
        message: String,

        /// Working directory (defaults to the one recorded for the project)
        #[arg(long)]
        dir: Option<String>,

        /// Explicit intent instead of marker-phrase detection
        #[arg(long, value_enum)]
        intent: Option<Intent>,

        /// Correction attempts already made for a reported bug
        #[arg(long, default_value_t = 0)]
        qa_attempts: u32,
    },

    /// Show every role's memory and task list for a project
    Status {
        #[arg(value_parser = ProjectId::parse)]
        project: ProjectId,
    },

    /// Terminate running tool processes
    Kill,

    /// Check a working directory and write its tool permission settings
    ValidateDir {
        /// Absolute path
        dir: String,
    },

    /// Run the HTTP API
    Serve {
        /// Bind address (overrides [server].bind)
        #[arg(long)]
        bind: Option<String>,

        /// Port (overrides [server].port)
        #[arg(long)]
        port: Option<u16>,
    },
}
