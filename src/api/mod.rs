//! API layer - HTTP handlers and routing
//!
//! JSON endpoints under `/api/v1`:
//! - Auth endpoints (sign-up, sign-in, sign-out, session)
//! - Task endpoints (list, create, update, delete)
//!
//! plus an unauthenticated `/health` probe.

pub mod auth;
pub mod middleware;
pub mod tasks;

use axum::{
    http::{header, HeaderValue, Method},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState};

/// Build the `/api/v1` router
pub fn build_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .merge(tasks::router())
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors = cors.allow_origin(origin),
        Err(_) => tracing::warn!("Ignoring invalid CORS origin: {}", cors_origin),
    }

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", build_api_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// GET /health
async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
