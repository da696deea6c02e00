//! The error taxonomy and the terminal normalization stage.
//!
//! Every upstream stage and every route handler fails with an
//! [`IngressError`]; the [`ErrorNormalizer`] is the only component that turns
//! one into a client-facing response. It logs the full error server-side,
//! maps known kinds to their conventional status codes with safe messages,
//! and exposes internal detail only in development mode.
use std::time::Duration;

use axum::body::Body;
use http::{Response, StatusCode, header};
use thiserror::Error;

use crate::config::models::RuntimeMode;

/// All the ways a request can fail inside the ingress pipeline or a route
/// handler.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum IngressError {
    /// The backing store could not be reached during connection gating.
    #[error("backing store unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed request payload.
    #[error("invalid request payload: {0}")]
    Validation(String),

    /// Request body exceeded the configured size limit.
    #[error("request payload exceeds the {limit}-byte limit")]
    PayloadTooLarge { limit: usize },

    /// Per-identity request quota exceeded.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    TooManyRequests { retry_after: Duration },

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// Anything unexpected. Detail is only exposed in development mode.
    #[error("internal error: {0}")]
    Internal(eyre::Report),
}

// Manual impl: eyre::Report does not implement std::error::Error, so it
// cannot be a thiserror #[from] source.
impl From<eyre::Report> for IngressError {
    fn from(report: eyre::Report) -> Self {
        IngressError::Internal(report)
    }
}

impl IngressError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            IngressError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            IngressError::Validation(_) => StatusCode::BAD_REQUEST,
            IngressError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            IngressError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            IngressError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            IngressError::Forbidden(_) => StatusCode::FORBIDDEN,
            IngressError::NotFound(_) => StatusCode::NOT_FOUND,
            IngressError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Safe, non-leaking message for the client. Known kinds describe the
    /// failure class; internal errors stay generic here.
    fn client_message(&self) -> &'static str {
        match self {
            IngressError::ServiceUnavailable(_) => "Service temporarily unavailable",
            IngressError::Validation(_) => "Invalid request payload",
            IngressError::PayloadTooLarge { .. } => "Request payload too large",
            IngressError::TooManyRequests { .. } => "Too many requests, please retry later",
            IngressError::Unauthorized(_) => "Unauthorized",
            IngressError::Forbidden(_) => "Forbidden",
            IngressError::NotFound(_) => "Resource not found",
            IngressError::Internal(_) => "Internal server error",
        }
    }
}

/// Terminal pipeline stage: converts any [`IngressError`] into exactly one
/// JSON response, `{ "message": ..., ["details"]: ... }`.
pub struct ErrorNormalizer {
    mode: RuntimeMode,
}

impl ErrorNormalizer {
    pub fn new(mode: RuntimeMode) -> Self {
        Self { mode }
    }

    /// Map an error to its client-facing response, logging the full error
    /// server-side regardless of what is exposed.
    pub fn normalize(&self, error: &IngressError) -> Response<Body> {
        let status = error.status_code();
        tracing::error!(status = %status, error = %error, "request failed");

        let mut body = serde_json::json!({ "message": error.client_message() });

        if let IngressError::TooManyRequests { retry_after } = error {
            body["details"] = serde_json::json!({
                "retryAfterSecs": retry_after.as_secs().max(1),
            });
        } else if self.mode.is_development() {
            // Full detail (message plus error chain) only in development.
            let chain: Vec<String> = match error {
                IngressError::Internal(report) => {
                    report.chain().skip(1).map(|c| c.to_string()).collect()
                }
                _ => Vec::new(),
            };
            body["details"] = serde_json::json!({
                "error": error.to_string(),
                "chain": chain,
            });
        }

        let mut builder = Response::builder()
            .status(status)
            .header(header::CONTENT_TYPE, "application/json");

        if let IngressError::TooManyRequests { retry_after } = error {
            builder = builder.header(header::RETRY_AFTER, retry_after.as_secs().max(1));
        }

        builder
            .body(Body::from(body.to_string()))
            .unwrap_or_else(|_| {
                // Only reachable if the status/header constants above were
                // invalid, which they are not.
                Response::new(Body::from("{\"message\":\"Internal server error\"}"))
            })
    }
}
