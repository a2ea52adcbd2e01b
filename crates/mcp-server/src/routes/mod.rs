//! HTTP routes for the MCP resource server.
//!
//! Defines the Axum router and application state.

use crate::auth::Authorizer;
use crate::config::Config;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_auth, require_ready};
use axum::{
    body::Body,
    http::{header, HeaderName, HeaderValue, Method, StatusCode, Uri},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    sensitive_headers::SetSensitiveRequestHeadersLayer,
    set_header::SetResponseHeaderLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Value of the `Strict-Transport-Security` header on every response.
pub const HSTS_VALUE: &str = "max-age=31556926; includeSubDomains; preload";

/// How long browsers may cache a CORS preflight.
const CORS_MAX_AGE: Duration = Duration::from_secs(3600);

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Config,

    /// Authorization gate shared with the auth middleware.
    pub authorizer: Arc<Authorizer>,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready`, `/metrics` - operational endpoints
/// - `/.well-known/oauth-authorization-server`,
///   `/.well-known/openid-configuration` - cached IdP metadata (readiness gated)
/// - `/.well-known/oauth-protected-resource` - RFC 9728 metadata
/// - `/manifest.json`, `/tools`, `/prompts` - MCP discovery (public)
/// - `POST /mcp`, `GET /sse` - MCP protocol (bearer token required)
/// - CORS, HSTS, request id, panic catcher, request logging, 30 second
///   timeout and HTTP metrics on every response
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let authorizer = state.authorizer.clone();

    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route(
            "/.well-known/oauth-protected-resource",
            get(handlers::protected_resource_metadata),
        )
        .route("/manifest.json", get(handlers::manifest))
        .route("/tools", get(handlers::tools))
        .route("/prompts", get(handlers::prompts))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Serve the IdP's document only once it has been fetched
    let metadata_routes = Router::new()
        .route(
            "/.well-known/oauth-authorization-server",
            get(handlers::authorization_server_metadata),
        )
        .route(
            "/.well-known/openid-configuration",
            get(handlers::authorization_server_metadata),
        )
        .route_layer(middleware::from_fn_with_state(
            authorizer.clone(),
            require_ready,
        ))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/mcp", post(handlers::handle_mcp))
        .route("/sse", get(handlers::handle_sse))
        .route_layer(middleware::from_fn_with_state(authorizer, require_auth))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer - Timeout the request (innermost)
    // 2. CatchPanicLayer - Turn handler panics into a JSON 500
    // 3. HSTS header
    // 4. CorsLayer - Answer preflights, mirror the request origin
    // 5. TraceLayer - Log request details
    // 6. Mark Authorization as sensitive so it is never logged
    // 7. Request id generation and propagation
    // 8. http_metrics_middleware - Record ALL responses (outermost)
    public_routes
        .merge(metrics_routes)
        .merge(metadata_routes)
        .merge(protected_routes)
        .fallback(not_found)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS_VALUE),
        ))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .layer(SetSensitiveRequestHeadersLayer::new(std::iter::once(
            header::AUTHORIZATION,
        )))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(middleware::from_fn(http_metrics_middleware))
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods([
            Method::DELETE,
            Method::GET,
            Method::HEAD,
            Method::OPTIONS,
            Method::PATCH,
            Method::POST,
            Method::PUT,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ORIGIN,
            header::REFERER,
            header::ACCEPT,
            header::ACCEPT_LANGUAGE,
            header::ACCEPT_ENCODING,
            header::USER_AGENT,
            header::CONTENT_LENGTH,
            header::CACHE_CONTROL,
            header::PRAGMA,
            header::IF_UNMODIFIED_SINCE,
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(CORS_MAX_AGE)
}

async fn not_found(method: Method, uri: Uri) -> StatusCode {
    tracing::warn!(target: "mcp.routes", %method, path = %uri.path(), "Path not found");
    StatusCode::NOT_FOUND
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = err
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| err.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    tracing::error!(target: "mcp.routes", panic = %detail, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "title": "Unexpected error" })),
    )
        .into_response()
}
