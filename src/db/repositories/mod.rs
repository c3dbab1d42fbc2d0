//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the queries for a single table.

pub mod session;
pub mod task;
pub mod user;

pub use session::{SessionRepository, SqlxSessionRepository};
pub use task::{SqlxTaskRepository, TaskRepository};
pub use user::{SqlxUserRepository, UserRepository};
