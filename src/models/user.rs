//! User model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::timestamp_now;

/// A registered account, identified by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Unique identifier, assigned by the store
    pub id: i64,
    /// Email address (unique, lower-cased)
    pub email: String,
    /// Display name
    pub name: String,
    /// Password hash (argon2)
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, not yet persisted user.
    ///
    /// The password must already be hashed with
    /// `services::password::hash_password()`.
    pub fn new(email: String, name: String, password_hash: String) -> Self {
        let now = timestamp_now();
        Self {
            id: 0, // Will be set by the database
            email,
            name,
            password_hash,
            created_at: now,
            updated_at: now,
        }
    }
}
