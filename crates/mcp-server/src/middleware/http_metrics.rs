//! HTTP request metrics middleware.
//!
//! Applied as the outermost layer so every response is counted, including
//! gate rejections (401/503), CORS preflights and router-level 404/405.

use crate::observability::metrics::record_http_request;
use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

/// Record method, normalized path, status and duration for each request.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let response = next.run(request).await;

    record_http_request(
        method.as_str(),
        &path,
        response.status().as_u16(),
        start.elapsed(),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        middleware,
        routing::post,
        Router,
    };
    use tower::ServiceExt;

    fn test_app() -> Router {
        Router::new()
            .route(
                "/mcp",
                post(|| async { (StatusCode::UNAUTHORIZED, "no token") }),
            )
            .layer(middleware::from_fn(http_metrics_middleware))
    }

    async fn status_of(method: &str, uri: &str) -> StatusCode {
        let request = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        test_app().oneshot(request).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_handler_status_is_preserved() {
        assert_eq!(status_of("POST", "/mcp").await, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_router_level_errors_pass_through() {
        assert_eq!(status_of("GET", "/mcp").await, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(status_of("GET", "/nope").await, StatusCode::NOT_FOUND);
    }
}
