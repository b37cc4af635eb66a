use crate::app::AppState;
use crate::providers::{ProviderError, VaultError};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use rtd_core::validate::{validate_dispatch, validate_identifier};
use rtd_core::{EventKind, Subject, WireEvent};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(&'static str),
    Unavailable(&'static str),
    Timeout(&'static str),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg).into_response(),
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, msg.to_string()).into_response()
            }
            ApiError::Unavailable(what) => (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{what} not available"),
            )
                .into_response(),
            ApiError::Timeout(what) => {
                (StatusCode::GATEWAY_TIMEOUT, format!("{what} timed out")).into_response()
            }
        }
    }
}

fn provider_error(what: &'static str, err: ProviderError) -> ApiError {
    match err {
        ProviderError::Unavailable(reason) => {
            warn!(event = "provider_unavailable", what = what, reason = %reason);
            ApiError::Unavailable(what)
        }
        ProviderError::NotFound => ApiError::NotFound("not found"),
        ProviderError::Timeout => {
            warn!(event = "provider_timeout", what = what);
            ApiError::Timeout(what)
        }
    }
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok"}))
}

pub async fn fleet(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let knights = state
        .fleet
        .knights()
        .map_err(|err| provider_error("fleet", err))?;
    Ok(Json(knights).into_response())
}

pub async fn knight(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    validate_identifier("knight", &name)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let knight = state
        .fleet
        .knight(&name)
        .map_err(|err| provider_error("fleet", err))?;
    Ok(Json(knight).into_response())
}

pub async fn knight_logs(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    validate_identifier("knight", &name)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let logs = state
        .fleet
        .logs(&name)
        .map_err(|err| provider_error("logs", err))?;
    Ok(([(header::CONTENT_TYPE, "text/plain")], logs).into_response())
}

#[derive(Debug, Deserialize)]
pub struct SessionQuery {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
}

pub async fn knight_session(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<SessionQuery>,
) -> Result<Response, ApiError> {
    validate_identifier("knight", &name)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let kind = query.kind.as_deref().unwrap_or("stats");
    let session = state
        .fleet
        .session(&name, kind)
        .map_err(|err| provider_error("session", err))?;
    Ok(Json(session).into_response())
}

pub async fn chains(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let chains = state
        .chains
        .chains()
        .map_err(|err| provider_error("chains", err))?;
    Ok(Json(chains).into_response())
}

pub async fn chain_detail(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    validate_identifier("chain", &name)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;
    let chain = state
        .chains
        .chain(&name)
        .map_err(|err| provider_error("chains", err))?;
    Ok(Json(chain).into_response())
}

#[derive(Debug, Serialize)]
pub struct TasksResponse {
    pub results: Vec<WireEvent>,
    pub messages: u64,
}

pub async fn tasks(State(state): State<Arc<AppState>>) -> Json<TasksResponse> {
    let results = state
        .bus
        .recent_results(50)
        .iter()
        .map(|e| e.to_wire())
        .collect();
    Json(TasksResponse {
        results,
        messages: state.bus.message_count(),
    })
}

#[derive(Debug, Deserialize)]
pub struct DispatchRequest {
    pub knight: String,
    pub domain: String,
    pub task: String,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Serialize)]
pub struct DispatchResponse {
    pub task_id: String,
    pub subject: String,
    pub status: &'static str,
}

/// Guaranteed-delivery dispatch path: validates at the boundary, mints
/// a task id, and publishes the task message.
pub async fn dispatch(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DispatchRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    validate_dispatch(&request.knight, &request.domain, &request.task)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let task_id = format!("{}-ui-{}", request.knight, Utc::now().timestamp_millis());
    let subject = Subject::task(&state.fleet_name, &request.domain, &task_id);
    let payload = json!({
        "from": "ui",
        "task_id": task_id,
        "domain": request.domain,
        "task": request.task,
        "metadata": {
            "type": "manual",
            "source": "dashboard",
            "timeout_ms": request.timeout_ms,
        },
    });
    state
        .bus
        .publish(EventKind::Task, subject.clone(), payload);
    info!(event = "task_dispatched", task_id = %task_id, subject = %subject);

    Ok(Json(DispatchResponse {
        task_id,
        subject,
        status: "dispatched",
    }))
}

pub async fn briefings(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let names = state
        .vault
        .list()
        .map_err(|_| ApiError::NotFound("briefings directory not found"))?;
    Ok(Json(names).into_response())
}

pub async fn briefing(
    State(state): State<Arc<AppState>>,
    Path(date): Path<String>,
) -> Result<Response, ApiError> {
    let content = state.vault.read(&date).map_err(|err| match err {
        VaultError::Invalid(err) => ApiError::BadRequest(err.to_string()),
        VaultError::NotFound => ApiError::NotFound("briefing not found"),
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/markdown")],
        content,
    )
        .into_response())
}
