//! REST endpoints for task submission and processor monitoring.
//!
//! Deliberately thin: no authentication, no pagination. Validation errors
//! are rejected here, before anything reaches the processor.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use rust_decimal::Decimal;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::{Error, TaskError};
use crate::processor::TaskProcessor;
use crate::store::{TaskStore, VaultStore};
use crate::tasks::{self, ComputeTask};

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub tasks: Arc<dyn TaskStore>,
    pub vault: Arc<dyn VaultStore>,
    pub processor: Arc<TaskProcessor>,
}

/// Request body for task creation.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub owner_id: String,
    pub name: String,
    pub cost_credits: Decimal,
    #[serde(default)]
    pub estimated_duration: Option<u64>,
    #[serde(default)]
    pub priority: Option<i32>,
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

fn error_response(err: Error) -> Response {
    let (status, message) = match &err {
        Error::Task(TaskError::NotFound { .. }) => (StatusCode::NOT_FOUND, err.to_string()),
        Error::Task(TaskError::NotCancellable { .. }) => (StatusCode::CONFLICT, err.to_string()),
        _ => {
            tracing::error!(error = %err, "API request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            )
        }
    };
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

/// POST /api/tasks
///
/// Create a task in `queued`; the processor picks it up on its next tick.
async fn create_task(
    State(state): State<ApiState>,
    Json(req): Json<CreateTaskRequest>,
) -> Response {
    if req.name.trim().is_empty() {
        return bad_request("name must not be empty");
    }
    if req.cost_credits <= Decimal::ZERO {
        return bad_request("cost_credits must be greater than 0");
    }
    if req.owner_id.trim().is_empty() {
        return bad_request("owner_id must not be empty");
    }

    let mut task = ComputeTask::new(req.owner_id, req.name, req.cost_credits);
    if let Some(units) = req.estimated_duration {
        task = task.with_estimated_duration(units);
    }
    if let Some(priority) = req.priority {
        task = task.with_priority(priority);
    }

    match state.tasks.insert_task(&task).await {
        Ok(()) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// GET /api/tasks/{id}
async fn get_task(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.tasks.get_task(id).await {
        Ok(Some(task)) => Json(task).into_response(),
        Ok(None) => error_response(TaskError::NotFound { id }.into()),
        Err(e) => error_response(e.into()),
    }
}

/// POST /api/tasks/{id}/cancel
///
/// Only queued tasks are cancellable; running and terminal tasks return 409.
async fn cancel_task(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match tasks::cancel(&state.tasks, id).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/tasks/{id}/history
async fn task_history(State(state): State<ApiState>, Path(id): Path<Uuid>) -> Response {
    match state.processor.execution_history(id).await {
        Ok(history) => Json(history).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/processor/status
async fn processor_status(State(state): State<ApiState>) -> Response {
    match state.processor.stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/processor/queue
async fn processor_queue(State(state): State<ApiState>) -> Response {
    match state.processor.queue_snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /api/vault
async fn vault_stats(State(state): State<ApiState>) -> Response {
    match state.vault.load_or_create().await {
        Ok(vault) => Json(vault).into_response(),
        Err(e) => error_response(e.into()),
    }
}

/// Build the API router.
pub fn api_routes(state: ApiState) -> Router {
    Router::new()
        .route("/api/tasks", post(create_task))
        .route("/api/tasks/{id}", get(get_task))
        .route("/api/tasks/{id}/cancel", post(cancel_task))
        .route("/api/tasks/{id}/history", get(task_history))
        .route("/api/processor/status", get(processor_status))
        .route("/api/processor/queue", get(processor_queue))
        .route("/api/vault", get(vault_stats))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
