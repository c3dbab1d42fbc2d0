//! Authentication API endpoints
//!
//! - POST /api/v1/auth/sign-up - Create an account and sign in
//! - POST /api/v1/auth/sign-in - Sign in
//! - POST /api/v1/auth/sign-out - Sign out
//! - GET /api/v1/auth/session - Current user

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{
    clear_session_cookie, session_cookie, ApiError, AppState, ValidJson,
};
use crate::models::{DeleteResult, User};
use crate::services::auth::{AuthError, SignInInput, SignUpInput, SignedIn};
use crate::services::context::{extract_session_token, Caller};

/// Response for successful authentication
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

/// Response for the current session
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: User,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/sign-in", post(sign_in))
        .route("/sign-out", post(sign_out))
        .route("/session", get(current_session))
}

fn signed_in_response(
    state: &AppState,
    status: StatusCode,
    signed_in: SignedIn,
) -> impl IntoResponse {
    let cookie = session_cookie(&state.auth_config, &signed_in.session.id);
    (
        status,
        [(header::SET_COOKIE, cookie)],
        Json(AuthResponse {
            user: signed_in.user,
            token: signed_in.session.id,
        }),
    )
}

/// POST /api/v1/auth/sign-up
async fn sign_up(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SignUpInput>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in = state.auth_service.sign_up(body).await?;
    tracing::info!(user_id = signed_in.user.id, "User signed up");
    Ok(signed_in_response(&state, StatusCode::CREATED, signed_in))
}

/// POST /api/v1/auth/sign-in
async fn sign_in(
    State(state): State<AppState>,
    ValidJson(body): ValidJson<SignInInput>,
) -> Result<impl IntoResponse, ApiError> {
    let signed_in = state.auth_service.sign_in(body).await.map_err(|e| {
        if matches!(e, AuthError::InvalidCredentials) {
            tracing::warn!("Failed sign-in attempt");
        }
        e
    })?;
    Ok(signed_in_response(&state, StatusCode::OK, signed_in))
}

/// POST /api/v1/auth/sign-out
///
/// Always succeeds and clears the cookie, signed in or not.
async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers, state.auth_service.cookie_name()) {
        state.auth_service.sign_out(&token).await?;
    }

    Ok((
        [(header::SET_COOKIE, clear_session_cookie(&state.auth_config))],
        Json(DeleteResult { success: true }),
    ))
}

/// GET /api/v1/auth/session
async fn current_session(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<SessionResponse>, ApiError> {
    let user = state
        .auth_service
        .get_user(caller.user_id())
        .await?
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    Ok(Json(SessionResponse { user }))
}
