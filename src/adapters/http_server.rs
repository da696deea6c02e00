//! Axum wiring for the ingress pipeline.
//!
//! Builds a catch-all router that converts each inbound request into a
//! [`RequestContext`] (origin, client identity, raw body) and drives it
//! through the [`Ingress`] pipeline, plus the `serve` entry point binding
//! the configured port.
use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, Request, State},
    middleware,
    response::Response,
};
use eyre::{Context, Result};
use http::HeaderMap;
use tower_http::trace::TraceLayer;

use crate::{
    adapters::middleware::{request_id_middleware, request_timing_middleware},
    core::Ingress,
};

/// Prefer proxy-provided client addresses over the socket peer, the same
/// order a gateway in front of this server would populate them.
fn client_identity(headers: &HeaderMap, client_addr: Option<SocketAddr>) -> String {
    if let Some(forwarded_for) = headers.get("X-Forwarded-For")
        && let Ok(value) = forwarded_for.to_str()
        && let Some(first) = value.split(',').next()
    {
        let first = first.trim();
        if !first.is_empty() {
            return first.to_string();
        }
    }

    if let Some(real_ip) = headers.get("X-Real-IP")
        && let Ok(value) = real_ip.to_str()
    {
        return value.to_string();
    }

    client_addr
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

async fn drive_pipeline(
    State(ingress): State<Arc<Ingress>>,
    request: Request<Body>,
) -> Response {
    let client_addr = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    let (parts, body) = request.into_parts();
    let client = client_identity(&parts.headers, client_addr);
    let ctx = crate::core::pipeline::RequestContext::new(
        parts.method,
        parts.uri.path().to_string(),
        parts.headers,
        client,
        body,
    );

    ingress.handle(ctx).await
}

/// Build the application router: every path and method funnels into the
/// pipeline, which owns routing under `/api` and 404s for everything else.
pub fn build_router(ingress: Arc<Ingress>) -> Router {
    Router::new()
        .fallback(drive_pipeline)
        .layer(middleware::from_fn(request_timing_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(ingress)
}

/// Bind `port` and serve the pipeline until the process is stopped.
pub async fn serve(ingress: Arc<Ingress>, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    tracing::info!("Listening on {addr}");

    axum::serve(
        listener,
        build_router(ingress).into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")
}
