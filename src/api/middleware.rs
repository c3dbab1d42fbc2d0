//! API middleware
//!
//! Shared request plumbing for the HTTP layer:
//! - `AppState` with the services handlers use
//! - `ApiError`, the JSON error body, and the service error mappings
//! - The `Caller` and `RequestContext` extractors (session guard)
//! - `ValidJson` / `ValidQuery`, which report malformed input as API errors
//! - Session cookie helpers

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        FromRequest, FromRequestParts, Query,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::services::auth::{AuthError, AuthService};
use crate::services::context::{Caller, ContextBuilder, RequestContext};
use crate::services::task::{TaskError, TaskService};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthService>,
    pub task_service: Arc<TaskService>,
    pub context_builder: ContextBuilder,
    pub auth_config: Arc<AuthConfig>,
}

impl AppState {
    /// Wire the services together. The auth service doubles as the session
    /// resolver for the context builder.
    pub fn new(
        auth_service: Arc<AuthService>,
        task_service: Arc<TaskService>,
        auth_config: AuthConfig,
    ) -> Self {
        Self {
            context_builder: ContextBuilder::new(auth_service.clone()),
            auth_service,
            task_service,
            auth_config: Arc::new(auth_config),
        }
    }
}

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    /// Log the full error chain and return a generic message to the client
    pub fn internal(err: &anyhow::Error) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(self)).into_response()
    }
}

impl From<TaskError> for ApiError {
    fn from(err: TaskError) -> Self {
        match err {
            TaskError::Unauthorized => ApiError::unauthorized(err.to_string()),
            TaskError::InvalidInput { field, message } => ApiError::with_details(
                "VALIDATION_ERROR",
                message,
                serde_json::json!({ "field": field }),
            ),
            TaskError::NotFound => ApiError::not_found(err.to_string()),
            TaskError::Storage(e) => ApiError::internal(&e),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::validation_error(msg),
            AuthError::EmailTaken => ApiError::conflict(err.to_string()),
            AuthError::InvalidCredentials => ApiError::unauthorized(err.to_string()),
            AuthError::Internal(e) => ApiError::internal(&e),
        }
    }
}

/// `Json` extractor that rejects with a `VALIDATION_ERROR` body
#[derive(Debug, FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ValidJson<T>(pub T);

/// `Query` extractor that rejects with a `VALIDATION_ERROR` body
#[derive(Debug, FromRequestParts)]
#[from_request(via(Query), rejection(ApiError))]
pub struct ValidQuery<T>(pub T);

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        input_rejection(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        input_rejection(rejection.body_text())
    }
}

fn input_rejection(message: String) -> ApiError {
    match rejected_field(&message) {
        Some(field) => {
            let details = serde_json::json!({ "field": field });
            ApiError::with_details("VALIDATION_ERROR", message.clone(), details)
        }
        None => ApiError::validation_error(message),
    }
}

/// Field path of a deserialization error.
///
/// Rejection texts read `<context>: <path>: <reason>`; the path never
/// contains whitespace, which tells it apart from a plain reason.
fn rejected_field(message: &str) -> Option<&str> {
    let (_, rest) = message.split_once(": ")?;
    let (path, _) = rest.split_once(": ")?;
    (!path.is_empty() && !path.contains(char::is_whitespace)).then_some(path)
}

/// Per-request context, anonymous or authenticated
impl FromRequestParts<AppState> for RequestContext {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(state.context_builder.build(&parts.headers).await?)
    }
}

/// The session guard. Handlers that take a `Caller` reject anonymous
/// requests with 401 before their body is read.
impl FromRequestParts<AppState> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let ctx = RequestContext::from_request_parts(parts, state).await?;
        Ok(ctx.authorize()?)
    }
}

/// `Set-Cookie` value carrying a new session token
pub fn session_cookie(config: &AuthConfig, token: &str) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        config.cookie_name,
        token,
        config.session_max_age_seconds()
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie
pub fn clear_session_cookie(config: &AuthConfig) -> String {
    let mut cookie = format!(
        "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0",
        config.cookie_name
    );
    if config.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_task_errors_map_to_status_codes() {
        let cases = [
            (TaskError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                TaskError::InvalidInput {
                    field: "title",
                    message: "Title is required".to_string(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (TaskError::NotFound, StatusCode::NOT_FOUND),
            (
                TaskError::Storage(anyhow::anyhow!("disk on fire")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[tokio::test]
    async fn test_validation_error_carries_field() {
        let response = ApiError::from(TaskError::InvalidInput {
            field: "description",
            message: "Description is required".to_string(),
        })
        .into_response();

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "VALIDATION_ERROR");
        assert_eq!(json["error"]["message"], "Description is required");
        assert_eq!(json["error"]["details"]["field"], "description");
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let response =
            ApiError::from(AuthError::Internal(anyhow::anyhow!("password=hunter2"))).into_response();

        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "INTERNAL_ERROR");
        assert!(!json.to_string().contains("hunter2"));
    }

    #[test]
    fn test_auth_errors_map_to_codes() {
        assert_eq!(ApiError::from(AuthError::EmailTaken).error.code, "CONFLICT");
        assert_eq!(
            ApiError::from(AuthError::InvalidCredentials).error.code,
            "UNAUTHORIZED"
        );
        assert_eq!(
            ApiError::from(AuthError::Validation("bad".to_string())).error.code,
            "VALIDATION_ERROR"
        );
    }

    #[test]
    fn test_rejected_field() {
        assert_eq!(
            rejected_field(
                "Failed to deserialize the JSON body into the target type: status: invalid type: \
                 integer `5`, expected a string at line 1 column 45"
            ),
            Some("status")
        );
        assert_eq!(
            rejected_field("Failed to parse the request body as JSON: expected value at line 1 column 1"),
            None
        );
        assert_eq!(
            rejected_field("Expected request with `Content-Type: application/json`"),
            None
        );
        assert_eq!(
            rejected_field("Failed to deserialize query string: duplicate field `status`"),
            None
        );
    }

    #[test]
    fn test_session_cookie_attributes() {
        let mut config = AuthConfig::default();
        let cookie = session_cookie(&config, "abc");
        assert!(cookie.starts_with(&format!("{}=abc;", config.cookie_name)));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Lax"));
        assert!(cookie.contains(&format!("Max-Age={}", config.session_max_age_seconds())));
        assert!(!cookie.contains("Secure"));

        config.secure_cookie = true;
        assert!(session_cookie(&config, "abc").ends_with("; Secure"));
        assert!(clear_session_cookie(&config).contains("Max-Age=0"));
    }
}
