//! Health check handlers.
//!
//! - `/health`: Liveness probe - returns OK if the process is running
//! - `/ready`: Readiness probe - reports whether identity provider metadata
//!   is loaded

use crate::auth::AuthorizerState;
use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use std::sync::Arc;

/// Liveness probe handler.
///
/// Does NOT check any dependencies. A degraded authorizer is still a live
/// process; restarting it is the operator's call.
pub async fn health_check() -> &'static str {
    "OK"
}

/// Readiness probe handler.
///
/// Returns 200 once discovery succeeded, 503 while the authorizer is
/// uninitialized or degraded.
#[tracing::instrument(skip_all, name = "mcp.handlers.readiness")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let auth_state = state.authorizer.state();

    if auth_state == AuthorizerState::Ready {
        (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready".to_string(),
                auth_metadata: auth_state.as_str().to_string(),
            }),
        )
    } else {
        tracing::warn!(
            target: "mcp.handlers.readiness",
            auth_metadata = auth_state.as_str(),
            "Readiness check failed"
        );
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                status: "not_ready".to_string(),
                auth_metadata: auth_state.as_str().to_string(),
            }),
        )
    }
}
