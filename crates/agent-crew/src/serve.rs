//! HTTP API over a shared [`Crew`].
//!
//! Every response body is JSON. Client mistakes (missing fields, bad roles,
//! invalid directories) answer 400, anything else 500, both as
//! `{"error": "<message>"}`.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use crew_config::CrewConfig;
use crew_core::{CrewError, ProjectId};
use crew_memory::ProjectStatus;
use crew_orchestrator::{AgentEvent, Crew, EventOutcome, PromptOutcome};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

type AppState = Arc<Crew>;

pub fn router(crew: AppState) -> Router {
    Router::new()
        .route("/api/prompt", post(prompt))
        .route("/api/agent-communication", post(agent_communication))
        .route("/api/project-status/{project_id}", get(project_status))
        .route("/api/kill-claude", post(kill_tools))
        .route("/api/validate-working-dir", post(validate_working_dir))
        .route("/api/get-absolute-path", post(absolute_path))
        .fallback(not_found)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(crew)
}

/// Bind, serve until Ctrl-C, then stop any tool still running.
pub async fn run(config: &CrewConfig, bind: Option<String>, port: Option<u16>) -> Result<()> {
    config.require_api_key()?;
    let addr = format!(
        "{}:{}",
        bind.as_deref().unwrap_or(&config.server.bind),
        port.unwrap_or(config.server.port)
    );
    let crew = Arc::new(Crew::from_config(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, data_dir = %config.paths.data_dir().display(), "Crew API listening");

    axum::serve(listener, router(crew.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    let terminated = crew.terminate_tools();
    info!(terminated, "Crew API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for Ctrl-C");
    }
}

struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<CrewError>() {
            Some(crew_err) if crew_err.is_client_error() => Self::bad_request(crew_err.to_string()),
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: format!("{err:#}"),
            },
        }
    }
}

impl From<CrewError> for ApiError {
    fn from(err: CrewError) -> Self {
        anyhow::Error::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = %self.status, error = %self.message, "Request failed");
        } else {
            warn!(status = %self.status, error = %self.message, "Request rejected");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn required(value: Option<String>, message: &str) -> std::result::Result<String, ApiError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(message))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptRequest {
    prompt: Option<String>,
    working_dir: Option<String>,
}

async fn prompt(
    State(crew): State<AppState>,
    body: std::result::Result<Json<PromptRequest>, JsonRejection>,
) -> ApiResult<PromptOutcome> {
    let Json(req) = body?;
    let prompt = required(req.prompt, "Prompt is required")?;
    let working_dir = required(req.working_dir, "Working directory is required")?;
    Ok(Json(crew.submit_prompt(&prompt, &working_dir).await?))
}

async fn agent_communication(
    State(crew): State<AppState>,
    body: std::result::Result<Json<AgentEvent>, JsonRejection>,
) -> ApiResult<EventOutcome> {
    let Json(event) = body?;
    Ok(Json(crew.handle_event(&event).await?))
}

async fn project_status(
    State(crew): State<AppState>,
    Path(project_id): Path<String>,
) -> ApiResult<ProjectStatus> {
    let project = ProjectId::parse(&project_id)?;
    Ok(Json(crew.project_status(&project)?))
}

async fn kill_tools(State(crew): State<AppState>) -> ApiResult<Value> {
    let terminated = crew.terminate_tools();
    info!(terminated, "Tool processes terminated on request");
    Ok(Json(json!({
        "message": format!("Terminated {terminated} tool process(es)")
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkingDirRequest {
    working_dir: Option<String>,
}

async fn validate_working_dir(
    State(crew): State<AppState>,
    body: std::result::Result<Json<WorkingDirRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = body?;
    let working_dir = required(req.working_dir, "Working directory is required")?;
    crew.validate_working_dir(&working_dir)?;
    Ok(Json(json!({ "success": true })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AbsolutePathRequest {
    dir_name: Option<String>,
}

async fn absolute_path(
    body: std::result::Result<Json<AbsolutePathRequest>, JsonRejection>,
) -> ApiResult<Value> {
    let Json(req) = body?;
    let dir_name = required(req.dir_name, "Directory name is required")?;
    let path = crew_config::absolute_path(&dir_name)?;
    Ok(Json(json!({ "absolutePath": path })))
}

async fn not_found() -> ApiError {
    ApiError {
        status: StatusCode::NOT_FOUND,
        message: "Route not found".to_string(),
    }
}

#[cfg(test)]
#[path = "serve_tests.rs"]
mod tests;
