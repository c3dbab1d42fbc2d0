//! Authentication service
//!
//! Email/password accounts and the sessions that identify callers:
//! - Sign-up (also signs the new user in)
//! - Sign-in / sign-out
//! - Session resolution for the request context
//! - Expired session cleanup

use crate::config::AuthConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{Session, User};
use crate::services::context::{extract_session_token, SessionIdentity, SessionResolver};
use crate::services::password::{hash_password, verify_password};
use anyhow::Context;
use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::Duration;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Minimum password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Error types for authentication operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Input rejected before touching the store
    #[error("{0}")]
    Validation(String),

    /// An account with this email already exists
    #[error("An account with this email already exists")]
    EmailTaken,

    /// Unknown email or wrong password
    #[error("Invalid email or password")]
    InvalidCredentials,

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Input for sign-up
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SignUpInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl SignUpInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// Input for sign-in
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SignInInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl SignInInput {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// A signed-in user together with the session just issued
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub user: User,
    pub session: Session,
}

/// Authentication service
pub struct AuthService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
    cookie_name: String,
}

impl AuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_lifetime: Duration::days(config.session_expiration_days),
            cookie_name: config.cookie_name.clone(),
        }
    }

    /// Name of the cookie carrying the session token
    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Create an account and sign it in.
    ///
    /// The email is stored lower-cased. When no name is given, the part of
    /// the email before `@` is used.
    pub async fn sign_up(&self, input: SignUpInput) -> Result<SignedIn, AuthError> {
        let email = validate_email(&input.email)?;
        let password = input.password.trim();
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(AuthError::Validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LENGTH
            )));
        }

        if self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to check email uniqueness")?
            .is_some()
        {
            return Err(AuthError::EmailTaken);
        }

        let name = match input.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => email.split('@').next().unwrap_or_default().to_string(),
        };

        let password_hash = hash_password(password)?;
        // A concurrent sign-up can still win the race to the UNIQUE index
        let user = match self
            .user_repo
            .create(&User::new(email, name, password_hash))
            .await
        {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => return Err(AuthError::EmailTaken),
            Err(e) => return Err(e.context("Failed to create user").into()),
        };

        let session = self.create_session(user.id).await?;
        Ok(SignedIn { user, session })
    }

    /// Verify credentials and issue a new session.
    ///
    /// Unknown emails and wrong passwords give the same error.
    pub async fn sign_in(&self, input: SignInInput) -> Result<SignedIn, AuthError> {
        let email = validate_email(&input.email)?;
        let password = input.password.trim();
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        let user = self
            .user_repo
            .get_by_email(&email)
            .await
            .context("Failed to get user by email")?
            .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            return Err(AuthError::InvalidCredentials);
        }

        let session = self.create_session(user.id).await?;
        Ok(SignedIn { user, session })
    }

    /// End a session. Unknown tokens are ignored.
    pub async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Look up the user behind a session token.
    ///
    /// Expired sessions are removed and resolve to `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, AuthError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            if let Err(e) = self.session_repo.delete(token).await {
                tracing::warn!("Failed to remove expired session: {:#}", e);
            }
            return Ok(None);
        }

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;

        Ok(user)
    }

    /// Get a user by id
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AuthError> {
        let user = self
            .user_repo
            .get_by_id(id)
            .await
            .context("Failed to get user by ID")?;
        Ok(user)
    }

    /// Delete all expired sessions, returning how many were removed
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AuthError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    async fn create_session(&self, user_id: i64) -> Result<Session, AuthError> {
        let session = Session::new(user_id, self.session_lifetime);
        let created = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(created)
    }
}

#[async_trait]
impl SessionResolver for AuthService {
    async fn resolve_session(&self, headers: &HeaderMap) -> anyhow::Result<Option<SessionIdentity>> {
        let Some(token) = extract_session_token(headers, &self.cookie_name) else {
            return Ok(None);
        };

        let user = self
            .validate_session(&token)
            .await
            .map_err(anyhow::Error::from)?;

        Ok(user.map(|user| SessionIdentity {
            user_id: user.id,
            email: user.email,
            token,
        }))
    }
}

/// Whether a store error was caused by a UNIQUE constraint
fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

/// Trim, check the shape and lower-case an email address
fn validate_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim();
    if !EMAIL_RE.is_match(email) {
        return Err(AuthError::Validation("Enter a valid email".to_string()));
    }
    Ok(email.to_lowercase())
}
