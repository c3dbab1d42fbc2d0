//! Database layer
//!
//! Storage for users, sessions and tasks. Supports:
//! - SQLite (default, for single-binary deployment)
//! - MySQL
//!
//! The driver is selected from configuration. Repositories hold a
//! [`DynDatabasePool`] and dispatch on [`DatabasePool::backend`].

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, Backend, DatabasePool, DynDatabasePool, MysqlDatabase,
    SqliteDatabase,
};
