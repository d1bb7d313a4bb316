//! HTTP routes.

use aaa_core::{IdentityContext, Role};
use axum::{
    Extension, Json, Router,
    http::StatusCode,
    middleware,
    response::IntoResponse,
    routing::get,
};
use serde_json::json;
use tower_http::{catch_panic::CatchPanicLayer, timeout::TimeoutLayer, trace::TraceLayer};

use super::auth::{AuthGuard, auth_middleware};
use crate::auth::AuthPipeline;
use crate::config::{AuthConfig, ServerConfig};

/// Build the service router.
///
/// `/health` is public. `/auth/v1/identity` asks for every role and returns
/// the caller's resolved identity context.
///
/// No credential-bootstrap route is mounted here. An embedding application
/// that issues first credentials mounts exactly one route of its own behind
/// [`AuthGuard::bootstrap`]; every other route rejects anonymous callers.
pub fn create_router(pipeline: AuthPipeline, auth: &AuthConfig, server: &ServerConfig) -> Router {
    let identity_guard =
        AuthGuard::new(pipeline, Role::ALL).with_public_paths(&auth.public_paths);

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/auth/v1/identity",
            get(identity_handler)
                .layer(middleware::from_fn_with_state(identity_guard, auth_middleware)),
        )
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            server.request_timeout,
        ))
        .layer(TraceLayer::new_for_http())
}

/// Health check handler
async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Resolved identity of the caller.
async fn identity_handler(Extension(ctx): Extension<IdentityContext>) -> Json<IdentityContext> {
    Json(ctx)
}
