//! Task handlers.

use super::{ListTasksQuery, ProgressRequest, TaskListResponse};
use crate::api::AppState;
use crate::error::ApiError;
use crate::types::{StartTaskRequest, TaskId};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /tasks - Start a task for a catalogue item
///
/// Returns the existing task when the item already has an active one.
#[utoipa::path(
    post,
    path = "/api/v1/tasks",
    tag = "tasks",
    request_body = StartTaskRequest,
    responses(
        (status = 201, description = "Task created or already running", body = crate::types::DownloadTask),
        (status = 400, description = "Blank code", body = crate::error::ApiError),
        (status = 409, description = "Item already owned", body = crate::error::ApiError),
        (status = 503, description = "Shutting down or store unavailable", body = crate::error::ApiError)
    )
)]
pub async fn start_task(
    State(state): State<AppState>,
    Json(request): Json<StartTaskRequest>,
) -> Response {
    match state.downloader.start_task(request).await {
        Ok(task) => (StatusCode::CREATED, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /tasks - List tasks, newest first
#[utoipa::path(
    get,
    path = "/api/v1/tasks",
    tag = "tasks",
    params(ListTasksQuery),
    responses(
        (status = 200, description = "One page of tasks", body = TaskListResponse),
        (status = 400, description = "Unknown status filter", body = crate::error::ApiError)
    )
)]
pub async fn list_tasks(
    State(state): State<AppState>,
    Query(query): Query<ListTasksQuery>,
) -> Response {
    let filter = match query.into_filter() {
        Ok(filter) => filter,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(ApiError::validation(message))).into_response();
        }
    };

    match state.downloader.list_tasks(&filter).await {
        Ok((tasks, total)) => Json(TaskListResponse { tasks, total }).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /tasks/stats - Task counts by status and source
#[utoipa::path(
    get,
    path = "/api/v1/tasks/stats",
    tag = "tasks",
    responses(
        (status = 200, description = "Task counts", body = crate::types::TaskStats)
    )
)]
pub async fn task_stats(State(state): State<AppState>) -> Response {
    match state.downloader.get_task_stats().await {
        Ok(stats) => Json(stats).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /tasks/:id - Get single task
#[utoipa::path(
    get,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Task", body = crate::types::DownloadTask),
        (status = 404, description = "Task not found", body = crate::error::ApiError)
    )
)]
pub async fn get_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.get_task(TaskId(id)).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /tasks/by-code/:code - Current task for an item
#[utoipa::path(
    get,
    path = "/api/v1/tasks/by-code/{code}",
    tag = "tasks",
    params(("code" = String, Path, description = "Catalogue item identifier")),
    responses(
        (status = 200, description = "Task", body = crate::types::DownloadTask),
        (status = 404, description = "No task for this code", body = crate::error::ApiError)
    )
)]
pub async fn get_task_by_code(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    match state.downloader.get_task_by_code(&code).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => e.into_response(),
    }
}

/// PUT /tasks/by-code/:code/progress - Report backend progress
#[utoipa::path(
    put,
    path = "/api/v1/tasks/by-code/{code}/progress",
    tag = "tasks",
    params(("code" = String, Path, description = "Catalogue item identifier")),
    request_body = ProgressRequest,
    responses(
        (status = 200, description = "Updated task", body = crate::types::DownloadTask),
        (status = 404, description = "No task for this code", body = crate::error::ApiError),
        (status = 409, description = "Task is not downloading", body = crate::error::ApiError)
    )
)]
pub async fn update_progress(
    State(state): State<AppState>,
    Path(code): Path<String>,
    Json(request): Json<ProgressRequest>,
) -> Response {
    match state.downloader.update_progress(&code, request.progress).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /tasks/:id/cancel - Cancel an active task
#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/cancel",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 200, description = "Cancelled task", body = crate::types::DownloadTask),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task already finished", body = crate::error::ApiError)
    )
)]
pub async fn cancel_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.cancel_task(TaskId(id)).await {
        Ok(task) => Json(task).into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /tasks/:id/retry - Retry a failed task
#[utoipa::path(
    post,
    path = "/api/v1/tasks/{id}/retry",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 202, description = "Task reset to pending and re-run", body = crate::types::DownloadTask),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task is not failed", body = crate::error::ApiError)
    )
)]
pub async fn retry_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.retry_task(TaskId(id)).await {
        Ok(task) => (StatusCode::ACCEPTED, Json(task)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// DELETE /tasks/:id - Remove a finished task
#[utoipa::path(
    delete,
    path = "/api/v1/tasks/{id}",
    tag = "tasks",
    params(("id" = i64, Path, description = "Task ID")),
    responses(
        (status = 204, description = "Task removed"),
        (status = 404, description = "Task not found", body = crate::error::ApiError),
        (status = 409, description = "Task is still active", body = crate::error::ApiError)
    )
)]
pub async fn delete_task(State(state): State<AppState>, Path(id): Path<i64>) -> Response {
    match state.downloader.delete_task(TaskId(id)).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}
