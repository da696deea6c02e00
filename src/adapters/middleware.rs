//! Reusable Axum middleware attached outside the core pipeline.
//!
//! These layers stay stateless and handle transport-level diagnostics only
//! (request IDs, timing). Security and CORS headers are pipeline stages, not
//! middleware, so their ordering relative to the other checks stays
//! explicit.
use std::time::Instant;

use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};

/// Generate a per-request UUID and expose it via tracing plus `X-Request-ID`.
pub async fn request_id_middleware(req: Request, next: Next) -> Response {
    let request_id = uuid::Uuid::new_v4().to_string();

    let span = tracing::info_span!("request", request_id = %request_id);
    let _enter = span.enter();

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("X-Request-ID", header_value);
    }

    response
}

/// Log start/end of a request including latency.
pub async fn request_timing_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();

    tracing::debug!("Started processing {} {}", method, uri);

    let response = next.run(req).await;
    let duration = start.elapsed();

    tracing::info!(
        "Completed {} {} - {} in {:?}",
        method,
        uri,
        response.status(),
        duration
    );

    response
}

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
    };
    use tower::ServiceExt; // for oneshot

    use super::*;

    #[tokio::test]
    async fn test_request_id_middleware() {
        let app = Router::new()
            .route(
                "/",
                get(|| async {
                    axum::response::Response::builder()
                        .status(StatusCode::OK)
                        .body(Body::empty())
                        .unwrap()
                }),
            )
            .layer(middleware::from_fn(request_id_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let headers = response.headers();

        assert!(headers.contains_key("X-Request-ID"));

        // Verify it's a valid UUID
        let request_id = headers.get("X-Request-ID").unwrap().to_str().unwrap();
        assert!(uuid::Uuid::parse_str(request_id).is_ok());
    }

    #[tokio::test]
    async fn test_timing_middleware_passes_response_through() {
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_timing_middleware));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
