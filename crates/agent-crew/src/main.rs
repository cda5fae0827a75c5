use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod logging;
mod serve;

use cli::{Cli, Commands};
use crew_config::CrewConfig;
use crew_orchestrator::AgentEvent;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let output_format = cli.format.clone();
    let config = CrewConfig::load(cli.config.as_deref())?;

    // The server also keeps a daily log file; the guard flushes it on exit.
    let _log_guard = if matches!(cli.command, Commands::Serve { .. }) {
        let (writer, guard) = logging::create_server_log_writer(&config.paths.logs_dir())?;
        logging::init(Some(writer));
        Some(guard)
    } else {
        logging::init(None);
        None
    };

    match cli.command {
        Commands::Prompt { prompt, dir } => {
            commands::handle_prompt(&config, prompt, dir, output_format).await?;
        }
        Commands::Event {
            from,
            to,
            project,
            message,
            dir,
            intent,
            qa_attempts,
        } => {
            let event = AgentEvent {
                from_role: from,
                to_role: to,
                project_id: project,
                message,
                working_dir: dir,
                intent,
                qa_attempts,
            };
            commands::handle_event(&config, event, output_format).await?;
        }
        Commands::Status { project } => {
            commands::handle_status(&config, project, output_format)?;
        }
        Commands::Kill => {
            commands::handle_kill(&config, output_format).await?;
        }
        Commands::ValidateDir { dir } => {
            commands::handle_validate_dir(&config, dir, output_format)?;
        }
        Commands::Serve { bind, port } => {
            serve::run(&config, bind, port).await?;
        }
    }

    Ok(())
}
