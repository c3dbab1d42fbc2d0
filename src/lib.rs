//! Taskboard - a small personal task tracker
//!
//! Users sign up with email and password, then manage tasks that only they
//! can see. Every task operation runs behind a session guard and every task
//! query is filtered by the caller's user id.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
