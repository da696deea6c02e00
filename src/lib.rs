//! Portico - the request-ingress pipeline of an HTTP API server.
//!
//! Portico is the front door of one API server: the ordered set of
//! cross-cutting checks every inbound request passes before reaching a
//! business-logic route handler, and the single place every failure is
//! converted into a client-facing response. The library exposes the
//! building blocks so handlers and the backing store remain external
//! collaborators behind narrow interfaces.
//!
//! # Pipeline
//! Strictly linear per request:
//! connection gate → security headers → origin policy → request normalizer
//! → rate gate → router dispatch, with any failure short-circuiting to the
//! error normalizer. The chain is an explicit stage list with a single
//! driver loop (see [`core::pipeline`]), so the short-circuit contract is
//! testable without a live HTTP transport.
//!
//! # Features
//! - Lazy, idempotent backing-store connection caching that tolerates a
//!   serverless hosting model (one shared attempt across concurrent
//!   first-callers, allow-next-request-to-retry on failure)
//! - Origin allowlist with trailing-slash normalization; enforcement is an
//!   explicit configuration choice, defaulting to log-only
//! - Per-identity fixed-window rate limiting on the `/api` surface
//! - Size-bounded JSON and nested form-encoded payload decoding
//! - Handler registration by method+path under the `/api` prefix
//! - Centralized error normalization: one JSON error body per failure, full
//!   server-side logging, detail exposure only in development mode
//!
//! # Quick Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::Method;
//! use portico::{
//!     ApiResponse, ApiRouter, Ingress, TcpStoreConnector,
//!     config::AppConfig, core::connection::ConnectionManager,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let config = AppConfig::default();
//! let router = ApiRouter::new().route(Method::GET, "/ping", |_req| async {
//!     Ok::<_, portico::IngressError>(ApiResponse::ok(serde_json::json!({ "pong": true })))
//! });
//! let connection = ConnectionManager::new(Arc::new(TcpStoreConnector::new(
//!     config.store_addr.clone(),
//! )));
//! let ingress = Arc::new(Ingress::new(&config, connection, router).map_err(|e| eyre::eyre!(e))?);
//! portico::adapters::serve(ingress, config.port).await
//! # }
//! ```
//!
//! # Architecture
//! The crate separates **ports** (traits) from **adapters**
//! (implementations) and keeps the pipeline logic inside `core`. End users
//! should prefer the re-exports below over reaching into internal modules.
//!
//! # Error Handling
//! Pipeline and handler failures are the domain type
//! [`core::error::IngressError`]; fallible setup APIs return
//! `eyre::Result<T>` with context attached via `WrapErr`.
pub mod config;
pub mod ports;
pub mod tracing_setup;

// These modules are implementation details and should not be directly used by users
pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::TcpStoreConnector,
    core::{
        Ingress,
        dispatch::{ApiRequest, ApiResponse, ApiRouter},
        error::IngressError,
    },
    ports::store::StoreConnector,
};
