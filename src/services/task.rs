//! Task service
//!
//! The four task operations exposed to clients. Each one takes a [`Caller`],
//! which only exists after the session guard has passed, validates its raw
//! input into the typed form the repository accepts, and runs the query
//! under the caller's [`OwnerScope`](crate::services::context::OwnerScope).
//!
//! Error precedence: `Unauthorized` (at the guard) before `InvalidInput`
//! before `NotFound` or `Storage`.

use crate::db::repositories::TaskRepository;
use crate::models::{
    DeleteResult, ListTasksInput, StatusFilter, Task, TaskData, TaskFilter, TaskInput,
    TaskStatus, UpdateTaskInput,
};
use crate::services::context::Caller;
use std::sync::Arc;

/// Error types for task operations
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// No authenticated session
    #[error("Authentication required")]
    Unauthorized,

    /// A field failed validation; nothing was written
    #[error("{message}")]
    InvalidInput {
        field: &'static str,
        message: String,
    },

    /// The task does not exist or belongs to someone else
    #[error("Task not found")]
    NotFound,

    /// Store failure
    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl TaskError {
    fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        TaskError::InvalidInput {
            field,
            message: message.into(),
        }
    }
}

/// Task service
pub struct TaskService {
    repo: Arc<dyn TaskRepository>,
}

impl TaskService {
    pub fn new(repo: Arc<dyn TaskRepository>) -> Self {
        Self { repo }
    }

    /// List the caller's tasks, newest first.
    ///
    /// `query` is a case-sensitive substring of title or description; empty
    /// means no text filter. `status` is one of the task statuses or `"all"`.
    pub async fn list(&self, caller: &Caller, input: ListTasksInput) -> Result<Vec<Task>, TaskError> {
        let filter = validate_list_input(input)?;
        Ok(self.repo.find_many(&caller.scope(), &filter).await?)
    }

    /// Create a task owned by the caller
    pub async fn create(&self, caller: &Caller, input: TaskInput) -> Result<Task, TaskError> {
        let data = validate_task_input(input)?;
        Ok(self.repo.create(&caller.scope(), &data).await?)
    }

    /// Replace title, description and status of one of the caller's tasks.
    ///
    /// Missing and foreign tasks are indistinguishable: both are `NotFound`.
    /// A task deleted between the ownership check and the write is also
    /// `NotFound`.
    pub async fn update(&self, caller: &Caller, input: UpdateTaskInput) -> Result<Task, TaskError> {
        let data = validate_task_input(input.fields)?;
        let scope = caller.scope();

        if self.repo.find_first(&scope, &input.id).await?.is_none() {
            return Err(TaskError::NotFound);
        }

        self.repo
            .update(&scope, &input.id, &data)
            .await?
            .ok_or(TaskError::NotFound)
    }

    /// Delete one of the caller's tasks. Succeeds whether or not it existed.
    pub async fn delete(&self, caller: &Caller, id: &str) -> Result<DeleteResult, TaskError> {
        let removed = self.repo.delete_many(&caller.scope(), id).await?;
        tracing::debug!(user_id = caller.user_id(), task_id = id, removed, "Task delete");
        Ok(DeleteResult { success: true })
    }
}

/// Validate create/update fields. Title and description are trimmed.
pub fn validate_task_input(input: TaskInput) -> Result<TaskData, TaskError> {
    let title = input.title.trim();
    if title.is_empty() {
        return Err(TaskError::invalid("title", "Title is required"));
    }

    let description = input.description.trim();
    if description.is_empty() {
        return Err(TaskError::invalid("description", "Description is required"));
    }

    let status = match input.status.as_deref() {
        None => return Err(TaskError::invalid("status", "Status is required")),
        Some(raw) => raw.parse().map_err(|_| {
            TaskError::invalid("status", "Status must be one of: todo, in_progress, done")
        })?,
    };

    Ok(TaskData {
        title: title.to_string(),
        description: description.to_string(),
        status,
    })
}

/// Validate list filters
pub fn validate_list_input(input: ListTasksInput) -> Result<TaskFilter, TaskError> {
    let status = match input.status.as_deref() {
        None => StatusFilter::All,
        Some(raw) => raw.parse().map_err(|_| {
            TaskError::invalid(
                "status",
                "Status must be one of: todo, in_progress, done, all",
            )
        })?,
    };

    // An empty query matches everything
    Ok(TaskFilter {
        query: input.query.filter(|q| !q.is_empty()),
        status,
    })
}
