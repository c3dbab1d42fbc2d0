//! Data models
//!
//! Database entities (User, Session, Task) and the raw and validated input
//! types of the task operations.

mod session;
mod task;
mod user;

pub use session::Session;
pub use task::{
    timestamp_now, DeleteResult, ListTasksInput, StatusFilter, Task, TaskData, TaskFilter, TaskInput,
    TaskStatus, UpdateTaskInput,
};
pub use user::User;
