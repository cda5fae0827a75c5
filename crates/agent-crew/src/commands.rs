//! Handlers for the one-shot CLI commands.

use anyhow::{Context, Result};
use crew_config::CrewConfig;
use crew_core::{OutputFormat, ProjectId};
use crew_memory::ProjectStatus;
use crew_orchestrator::{AgentEvent, Crew, EventOutcome};
use serde::Serialize;

pub async fn handle_prompt(
    config: &CrewConfig,
    prompt: String,
    dir: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    config.require_api_key()?;
    let dir = match dir {
        Some(dir) => dir,
        None => current_dir()?,
    };
    let crew = Crew::from_config(config);
    let outcome = crew.submit_prompt(&prompt, &dir).await?;
    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => {
            println!("Project: {}", outcome.project_id);
            println!();
            println!("{}", outcome.response);
        }
    }
    Ok(())
}

pub async fn handle_event(
    config: &CrewConfig,
    event: AgentEvent,
    format: OutputFormat,
) -> Result<()> {
    config.require_api_key()?;
    let crew = Crew::from_config(config);
    let outcome = crew.handle_event(&event).await?;
    match format {
        OutputFormat::Json => print_json(&outcome)?,
        OutputFormat::Text => print_event_outcome(&event, &outcome),
    }
    Ok(())
}

pub fn handle_status(config: &CrewConfig, project: ProjectId, format: OutputFormat) -> Result<()> {
    let crew = Crew::from_config(config);
    let status = crew.project_status(&project)?;
    match format {
        OutputFormat::Json => print_json(&status)?,
        OutputFormat::Text => print_status(&project, &status),
    }
    Ok(())
}

/// Each CLI invocation owns its tool processes, so a separate `crew kill`
/// can only find running tools by name.
pub async fn handle_kill(config: &CrewConfig, format: OutputFormat) -> Result<()> {
    let executable = &config.tool.executable;
    let killed = crew_process::terminate_by_name(executable).await?;
    let message = if killed {
        format!("Terminated running '{executable}' processes")
    } else {
        format!("No running '{executable}' process")
    };
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({ "message": message }))?,
        OutputFormat::Text => println!("{message}"),
    }
    Ok(())
}

pub fn handle_validate_dir(config: &CrewConfig, dir: String, format: OutputFormat) -> Result<()> {
    let path = crew_config::validate_working_dir(&dir, &config.permissions)?;
    match format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "success": true,
            "workingDir": path,
        }))?,
        OutputFormat::Text => println!("OK: {}", path.display()),
    }
    Ok(())
}

fn current_dir() -> Result<String> {
    let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
    Ok(cwd.to_string_lossy().into_owned())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_event_outcome(event: &AgentEvent, outcome: &EventOutcome) {
    println!("[{}] {}", event.to_role, outcome.response);
    if let Some(qa) = &outcome.qa_response {
        println!();
        println!("[qa] {qa}");
    }
    if let Some(dev) = &outcome.developer_response {
        println!();
        println!("[developer] {dev}");
    }
    if let Some(pm) = &outcome.project_manager_response {
        println!();
        println!("[project_manager] {pm}");
    }
    if let Some(path) = &outcome.backup_created {
        eprintln!("Backup: {}", path.display());
    }
    if outcome.restored {
        eprintln!("Work restored from the latest backup");
    }
    if let Some(attempts) = outcome.qa_attempts {
        eprintln!("QA attempts: {attempts}");
    }
}

fn print_status(project: &ProjectId, status: &ProjectStatus) {
    println!("Project: {project}");
    for (role, memory) in &status.memories {
        println!();
        println!("== {role} memory ==");
        println!("{memory}");
    }
    for (role, tasks) in &status.tasks {
        println!();
        println!("== {role} tasks ==");
        println!("{tasks}");
    }
}
