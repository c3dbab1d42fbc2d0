//! Per-request context
//!
//! Every task operation starts from a [`RequestContext`], built once per call
//! from the request headers. The context carries the resolved session, if
//! any, and is the only place a [`Caller`] can come from:
//!
//! ```ignore
//! let ctx = builder.build(&headers).await?;
//! let caller = ctx.authorize()?;          // Unauthorized when anonymous
//! let tasks = task_service.list(&caller, input).await?;
//! ```
//!
//! A [`Caller`] in turn is the only source of an [`OwnerScope`], and the task
//! repository takes an `OwnerScope` on every read and write. Code that skips
//! the guard has no way to reach a scoped query.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use std::sync::Arc;

use crate::services::task::TaskError;

/// Identity attached to a valid, unexpired session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub user_id: i64,
    pub email: String,
    /// Session token the identity was resolved from
    pub token: String,
}

/// Turns request headers into a session identity, or `None` for anonymous.
///
/// Implemented by `AuthService`; tests substitute fixed resolvers.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    async fn resolve_session(&self, headers: &HeaderMap) -> anyhow::Result<Option<SessionIdentity>>;
}

/// Context of a single call
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    session: Option<SessionIdentity>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self { session: None }
    }

    pub fn authenticated(identity: SessionIdentity) -> Self {
        Self {
            session: Some(identity),
        }
    }

    pub fn session(&self) -> Option<&SessionIdentity> {
        self.session.as_ref()
    }

    /// The authorization guard: anonymous contexts fail with `Unauthorized`.
    pub fn authorize(&self) -> Result<Caller, TaskError> {
        self.session
            .as_ref()
            .map(|identity| Caller {
                user_id: identity.user_id,
            })
            .ok_or(TaskError::Unauthorized)
    }
}

/// An authenticated caller. Only obtainable through [`RequestContext::authorize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    user_id: i64,
}

impl Caller {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Owner filter for storage operations on this caller's tasks
    pub fn scope(&self) -> OwnerScope {
        OwnerScope {
            user_id: self.user_id,
        }
    }

    #[cfg(test)]
    pub(crate) fn for_user(user_id: i64) -> Self {
        Self { user_id }
    }
}

/// Row-ownership filter applied by every scoped task query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerScope {
    user_id: i64,
}

impl OwnerScope {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }
}

/// Builds a [`RequestContext`] per call from a shared resolver
#[derive(Clone)]
pub struct ContextBuilder {
    resolver: Arc<dyn SessionResolver>,
}

impl ContextBuilder {
    pub fn new(resolver: Arc<dyn SessionResolver>) -> Self {
        Self { resolver }
    }

    /// Resolve the session carried by `headers`.
    ///
    /// Missing, unknown or expired tokens give an anonymous context. Only a
    /// store failure while resolving is an error.
    pub async fn build(&self, headers: &HeaderMap) -> Result<RequestContext, TaskError> {
        let session = self.resolver.resolve_session(headers).await?;
        Ok(RequestContext { session })
    }
}

/// Extract a session token: `Authorization: Bearer` first, then the cookie
/// named `cookie_name`.
pub fn extract_session_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                let token = token.trim();
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }

    for cookie_header in headers.get_all(header::COOKIE) {
        let Ok(cookie_str) = cookie_header.to_str() else {
            continue;
        };
        for cookie in cookie_str.split(';') {
            let Some((name, value)) = cookie.trim().split_once('=') else {
                continue;
            };
            if name == cookie_name && !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }

    None
}
