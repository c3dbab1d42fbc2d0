//! Task model
//!
//! A task is owned by exactly one user. The owner is fixed at creation and
//! every later read or write of the row is filtered by it.

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Task entity as stored and as sent over the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque identifier (UUID v4)
    pub id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// Owning user, immutable after creation
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Current time at the precision the store keeps (microseconds), so a
/// returned task compares equal to the same row read back later
pub fn timestamp_now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

impl Task {
    /// Build a new task for `user_id` with a fresh id and timestamps
    pub fn new(user_id: i64, data: TaskData) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: data.title,
            description: data.description,
            status: data.status,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Task workflow status.
///
/// There is no enforced transition graph; any status may follow any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Done => "done",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(TaskStatus::Todo),
            "in_progress" => Ok(TaskStatus::InProgress),
            "done" => Ok(TaskStatus::Done),
            _ => Err(anyhow::anyhow!("Invalid task status: {}", s)),
        }
    }
}

/// Status filter accepted by `list`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    /// No status filter (`"all"` or absent)
    #[default]
    All,
    Only(TaskStatus),
}

impl FromStr for StatusFilter {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(StatusFilter::All);
        }
        s.parse::<TaskStatus>()
            .map(StatusFilter::Only)
            .map_err(|_| anyhow::anyhow!("Invalid status filter: {}", s))
    }
}

/// Validated task fields, written in full by create and update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskData {
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
}

/// Validated filter for listing tasks
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    /// Case-sensitive substring of title or description, never empty
    pub query: Option<String>,
    pub status: StatusFilter,
}

/// Raw input for creating a task, or the body of an update.
///
/// Missing fields deserialize as empty so that validation reports them by
/// field. `status` has no default and is required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: Option<String>,
}

impl TaskInput {
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        status: TaskStatus,
    ) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            status: Some(status.to_string()),
        }
    }
}

/// Raw input for updating a task (full replace)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateTaskInput {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub fields: TaskInput,
}

impl UpdateTaskInput {
    pub fn new(id: impl Into<String>, fields: TaskInput) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }
}

/// Raw input for listing tasks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListTasksInput {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Result of `delete`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteResult {
    pub success: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_through_str() {
        for status in TaskStatus::ALL {
            assert_eq!(status.to_string().parse::<TaskStatus>().unwrap(), status);
        }
        assert!("DONE".parse::<TaskStatus>().is_err());
        assert!("all".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn test_status_filter_from_str() {
        assert_eq!("all".parse::<StatusFilter>().unwrap(), StatusFilter::All);
        assert_eq!(
            "in_progress".parse::<StatusFilter>().unwrap(),
            StatusFilter::Only(TaskStatus::InProgress)
        );
        assert!("archived".parse::<StatusFilter>().is_err());
    }

    #[test]
    fn test_task_serializes_camel_case() {
        let task = Task::new(
            7,
            TaskData {
                title: "Write report".to_string(),
                description: "Quarterly numbers".to_string(),
                status: TaskStatus::InProgress,
            },
        );

        let json = serde_json::to_value(&task).unwrap();

        assert_eq!(json["userId"], 7);
        assert_eq!(json["status"], "in_progress");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("updatedAt").is_some());
        assert!(json.get("user_id").is_none());
    }

    #[test]
    fn test_new_task_has_fresh_id_and_equal_timestamps() {
        let data = TaskData {
            title: "a".to_string(),
            description: "b".to_string(),
            status: TaskStatus::Todo,
        };
        let first = Task::new(1, data.clone());
        let second = Task::new(1, data);

        assert_ne!(first.id, second.id);
        assert!(Uuid::parse_str(&first.id).is_ok());
        assert_eq!(first.created_at, first.updated_at);
    }

    #[test]
    fn test_new_task_timestamps_are_microsecond_precision() {
        let task = Task::new(
            1,
            TaskData {
                title: "a".to_string(),
                description: "b".to_string(),
                status: TaskStatus::Todo,
            },
        );

        assert_eq!(task.created_at.timestamp_subsec_nanos() % 1_000, 0);
        assert_eq!(timestamp_now().timestamp_subsec_nanos() % 1_000, 0);
    }

    #[test]
    fn test_update_input_flattens_fields() {
        let input: UpdateTaskInput = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "title": "t",
            "description": "d",
            "status": "done"
        }))
        .unwrap();

        assert_eq!(input.id, "abc");
        assert_eq!(input.fields.title, "t");
        assert_eq!(input.fields.status.as_deref(), Some("done"));
    }
}
