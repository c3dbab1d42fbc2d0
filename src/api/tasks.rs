//! Task API endpoints
//!
//! Every handler takes a [`Caller`], so anonymous requests are rejected with
//! 401 before any input is parsed or validated. Malformed bodies and query
//! strings are `VALIDATION_ERROR`s like any other bad input.
//!
//! - GET /api/v1/tasks?query=&status= - List the caller's tasks
//! - POST /api/v1/tasks - Create a task
//! - PUT /api/v1/tasks/{id} - Replace a task
//! - DELETE /api/v1/tasks/{id} - Delete a task

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, ValidJson, ValidQuery};
use crate::models::{DeleteResult, ListTasksInput, Task, TaskInput, UpdateTaskInput};
use crate::services::context::Caller;

/// Build the task router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/{id}", put(update_task).delete(delete_task))
}

/// GET /api/v1/tasks
async fn list_tasks(
    State(state): State<AppState>,
    caller: Caller,
    ValidQuery(query): ValidQuery<ListTasksInput>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let tasks = state.task_service.list(&caller, query).await?;
    Ok(Json(tasks))
}

/// POST /api/v1/tasks
async fn create_task(
    State(state): State<AppState>,
    caller: Caller,
    ValidJson(body): ValidJson<TaskInput>,
) -> Result<impl IntoResponse, ApiError> {
    let task = state.task_service.create(&caller, body).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// PUT /api/v1/tasks/{id}
async fn update_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    ValidJson(body): ValidJson<TaskInput>,
) -> Result<Json<Task>, ApiError> {
    let task = state
        .task_service
        .update(&caller, UpdateTaskInput::new(id, body))
        .await?;
    Ok(Json(task))
}

/// DELETE /api/v1/tasks/{id}
async fn delete_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    let result = state.task_service.delete(&caller, &id).await?;
    Ok(Json(result))
}
