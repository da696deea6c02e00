//! The ingress pipeline: ordered stages composed by a single driver loop.
//!
//! Control flow is strictly linear per request: connection gate → security
//! headers → origin policy → request normalizer → rate gate → router
//! dispatch. Each stage returns a tagged [`StageOutcome`]; `Fail` at any
//! point short-circuits the remaining stages and goes to the error
//! normalizer, `Respond` ends the pipeline early (CORS preflight), and the
//! driver writes exactly one response either way. Modeling the chain as an
//! explicit stage list keeps the short-circuit contract testable without a
//! live HTTP transport.
use axum::body::Body;
use http::{HeaderMap, HeaderValue, Method, Response, StatusCode, header};

use crate::{
    config::models::AppConfig,
    core::{
        body::RequestNormalizer,
        connection::ConnectionManager,
        dispatch::{API_PREFIX, ApiRouter},
        error::{ErrorNormalizer, IngressError},
        origin::OriginPolicy,
        rate_limit::{Admission, RateGate},
    },
};

/// Everything the stages need to see about one request, plus the response
/// headers they accumulate along the way.
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    /// Declared Origin header, if any.
    pub origin: Option<String>,
    /// Client identity for rate limiting (source address).
    pub client: String,
    /// Raw body; consumed by the request normalizer.
    pub body: Body,
    /// Parsed payload set by the request normalizer.
    pub payload: Option<serde_json::Value>,
    /// Headers applied to whichever response wins (success or error).
    pub response_headers: HeaderMap,
}

impl RequestContext {
    /// Build a context from request parts. The origin and client identity
    /// are extracted here so core stages never touch transport types.
    pub fn new(method: Method, path: String, headers: HeaderMap, client: String, body: Body) -> Self {
        let origin = headers
            .get(header::ORIGIN)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        Self {
            method,
            path,
            headers,
            origin,
            client,
            body,
            payload: None,
            response_headers: HeaderMap::new(),
        }
    }
}

/// Tagged result of one pipeline stage.
pub enum StageOutcome {
    /// Proceed to the next stage.
    Continue,
    /// End the pipeline with this response (no dispatch).
    Respond(Response<Body>),
    /// Short-circuit to the error normalizer.
    Fail(IngressError),
}

/// The ordered stages ahead of router dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    ConnectionGate,
    SecurityHeaders,
    OriginPolicy,
    RequestNormalizer,
    RateGate,
}

/// Pipeline order, ahead of router dispatch.
pub const STAGES: [Stage; 5] = [
    Stage::ConnectionGate,
    Stage::SecurityHeaders,
    Stage::OriginPolicy,
    Stage::RequestNormalizer,
    Stage::RateGate,
];

/// The assembled ingress pipeline. Owns every stage's state; cheap to share
/// via `Arc` across in-flight requests.
pub struct Ingress {
    connection: ConnectionManager,
    origin_policy: OriginPolicy,
    normalizer: RequestNormalizer,
    rate_gate: RateGate,
    router: ApiRouter,
    errors: ErrorNormalizer,
}

impl Ingress {
    /// Assemble the pipeline from configuration, an injected connection
    /// manager and the registered route handlers.
    pub fn new(
        config: &AppConfig,
        connection: ConnectionManager,
        router: ApiRouter,
    ) -> Result<Self, String> {
        Ok(Self {
            connection,
            origin_policy: OriginPolicy::new(
                &config.frontend_url,
                config.enforce_origin_allowlist,
            ),
            normalizer: RequestNormalizer::new(config.max_body_bytes),
            rate_gate: RateGate::from_config(&config.rate_limit)?,
            router,
            errors: ErrorNormalizer::new(config.runtime_mode),
        })
    }

    /// Drive one request through the stage list, dispatch it, and normalize
    /// any failure. Exactly one response is produced, and the headers the
    /// stages accumulated are applied to it last (nothing downstream of the
    /// error normalizer modifies the response).
    pub async fn handle(&self, mut ctx: RequestContext) -> Response<Body> {
        let mut response = match self.run_stages(&mut ctx).await {
            StageOutcome::Continue => match self.dispatch(&mut ctx).await {
                Ok(response) => response,
                Err(error) => self.errors.normalize(&error),
            },
            StageOutcome::Respond(response) => response,
            StageOutcome::Fail(error) => self.errors.normalize(&error),
        };

        for (name, value) in &ctx.response_headers {
            response.headers_mut().insert(name, value.clone());
        }
        response
    }

    async fn run_stages(&self, ctx: &mut RequestContext) -> StageOutcome {
        for stage in STAGES {
            match self.run_stage(stage, ctx).await {
                StageOutcome::Continue => {}
                outcome => return outcome,
            }
        }
        StageOutcome::Continue
    }

    async fn run_stage(&self, stage: Stage, ctx: &mut RequestContext) -> StageOutcome {
        match stage {
            Stage::ConnectionGate => match self.connection.ensure_connected().await {
                Ok(()) => StageOutcome::Continue,
                Err(error) => StageOutcome::Fail(error),
            },
            Stage::SecurityHeaders => {
                security_headers(&mut ctx.response_headers);
                StageOutcome::Continue
            }
            Stage::OriginPolicy => self.origin_stage(ctx),
            Stage::RequestNormalizer => {
                let body = std::mem::replace(&mut ctx.body, Body::empty());
                let content_type = ctx
                    .headers
                    .get(header::CONTENT_TYPE)
                    .and_then(|v| v.to_str().ok())
                    .map(|v| v.to_string());
                match self.normalizer.normalize(content_type.as_deref(), body).await {
                    Ok(payload) => {
                        ctx.payload = payload;
                        StageOutcome::Continue
                    }
                    Err(error) => StageOutcome::Fail(error),
                }
            }
            Stage::RateGate => {
                // The gate bounds the API surface only.
                if !ctx.path.starts_with(API_PREFIX) {
                    return StageOutcome::Continue;
                }
                match self.rate_gate.admit(&ctx.client).await {
                    Admission::Allowed => StageOutcome::Continue,
                    Admission::Rejected { retry_after } => {
                        tracing::warn!(client = %ctx.client, "rate limit exceeded");
                        StageOutcome::Fail(IngressError::TooManyRequests { retry_after })
                    }
                }
            }
        }
    }

    fn origin_stage(&self, ctx: &mut RequestContext) -> StageOutcome {
        let allowed = self.origin_policy.is_allowed(ctx.origin.as_deref());

        if !allowed {
            if self.origin_policy.enforces() {
                return StageOutcome::Fail(IngressError::Forbidden(format!(
                    "origin '{}' is not allowlisted",
                    ctx.origin.as_deref().unwrap_or_default()
                )));
            }
            // Log-only mode: diagnostics, never rejection.
            tracing::warn!(
                origin = ctx.origin.as_deref().unwrap_or_default(),
                "request origin is not allowlisted (permissive mode, allowing)"
            );
        }

        if let Some(origin) = &ctx.origin
            && let Ok(value) = HeaderValue::from_str(origin)
        {
            cors_headers(&mut ctx.response_headers, value);
        }

        if ctx.method == Method::OPTIONS {
            // Preflight: answer directly, skipping the rest of the pipeline.
            let response = Response::builder()
                .status(StatusCode::NO_CONTENT)
                .header(
                    "Access-Control-Allow-Methods",
                    "GET, POST, PUT, DELETE, PATCH, OPTIONS",
                )
                .body(Body::empty())
                .unwrap_or_else(|_| Response::new(Body::empty()));
            return StageOutcome::Respond(response);
        }

        StageOutcome::Continue
    }

    async fn dispatch(&self, ctx: &mut RequestContext) -> Result<Response<Body>, IngressError> {
        let api_response = self
            .router
            .dispatch(
                &ctx.method,
                &ctx.path,
                std::mem::take(&mut ctx.headers),
                ctx.payload.take(),
                ctx.client.clone(),
            )
            .await?;

        Response::builder()
            .status(api_response.status)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(api_response.body.to_string()))
            .map_err(|e| IngressError::Internal(eyre::eyre!("failed to build response: {e}")))
    }
}

/// Hardening headers applied to every response.
fn security_headers(headers: &mut HeaderMap) {
    headers.insert(
        "X-Content-Type-Options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-XSS-Protection",
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
}

/// CORS headers echoing the caller origin.
fn cors_headers(headers: &mut HeaderMap, origin: HeaderValue) {
    headers.insert("Access-Control-Allow-Origin", origin);
    headers.insert(
        "Access-Control-Allow-Credentials",
        HeaderValue::from_static("true"),
    );
    headers.insert(
        "Access-Control-Allow-Headers",
        HeaderValue::from_static("Content-Type, Authorization, X-Requested-With"),
    );
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;

    use super::*;
    use crate::{
        core::dispatch::{ApiRequest, ApiResponse},
        ports::store::{StoreConnector, StoreError},
    };

    struct HealthyStore;

    #[async_trait]
    impl StoreConnector for HealthyStore {
        async fn connect(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    struct DownStore;

    #[async_trait]
    impl StoreConnector for DownStore {
        async fn connect(&self) -> Result<(), StoreError> {
            Err(StoreError::ConnectionError("store down".to_string()))
        }
    }

    fn test_router(calls: Arc<AtomicUsize>) -> ApiRouter {
        ApiRouter::new().route(Method::POST, "/things", move |req: ApiRequest| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, IngressError>(ApiResponse::created(
                    req.payload.unwrap_or(serde_json::json!({})),
                ))
            }
        })
    }

    fn test_ingress(connector: Arc<dyn StoreConnector>, calls: Arc<AtomicUsize>) -> Ingress {
        let config = AppConfig::default();
        Ingress::new(
            &config,
            ConnectionManager::new(connector),
            test_router(calls),
        )
        .unwrap()
    }

    fn post(path: &str, body: &str) -> RequestContext {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        RequestContext::new(
            Method::POST,
            path.to_string(),
            headers,
            "10.0.0.1".to_string(),
            Body::from(body.to_string()),
        )
    }

    #[tokio::test]
    async fn test_happy_path_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ingress = test_ingress(Arc::new(HealthyStore), calls.clone());

        let response = ingress.handle(post("/api/things", r#"{"a":1}"#)).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // Security headers applied regardless of route.
        assert_eq!(
            response.headers().get("X-Content-Type-Options").unwrap(),
            "nosniff"
        );
    }

    #[tokio::test]
    async fn test_connection_failure_short_circuits_everything() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ingress = test_ingress(Arc::new(DownStore), calls.clone());

        let response = ingress.handle(post("/api/things", r#"{"a":1}"#)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        // Connection gate fails before the security-header stage runs.
        assert!(!response.headers().contains_key("X-Content-Type-Options"));
    }

    #[tokio::test]
    async fn test_unmatched_route_is_404() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ingress = test_ingress(Arc::new(HealthyStore), calls.clone());

        let response = ingress.handle(post("/api/missing-route", "{}")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_body_never_reaches_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = AppConfig {
            max_body_bytes: 32,
            ..AppConfig::default()
        };
        let ingress = Ingress::new(
            &config,
            ConnectionManager::new(Arc::new(HealthyStore)),
            test_router(calls.clone()),
        )
        .unwrap();

        let big = "x".repeat(64);
        let response = ingress.handle(post("/api/things", &big)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_preflight_answered_without_dispatch() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ingress = test_ingress(Arc::new(HealthyStore), calls.clone());

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ORIGIN,
            HeaderValue::from_static("http://localhost:3000"),
        );
        let ctx = RequestContext::new(
            Method::OPTIONS,
            "/api/things".to_string(),
            headers,
            "10.0.0.1".to_string(),
            Body::empty(),
        );

        let response = ingress.handle(ctx).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(
            response
                .headers()
                .get("Access-Control-Allow-Origin")
                .unwrap(),
            "http://localhost:3000"
        );
        assert!(
            response
                .headers()
                .contains_key("Access-Control-Allow-Methods")
        );
    }

    #[tokio::test]
    async fn test_cors_headers_echo_matching_origin() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = AppConfig {
            frontend_url: "https://app.example.com".to_string(),
            ..AppConfig::default()
        };
        let ingress = Ingress::new(
            &config,
            ConnectionManager::new(Arc::new(HealthyStore)),
            test_router(calls.clone()),
        )
        .unwrap();

        let mut ctx = post("/api/things", "{}");
        ctx.headers.insert(
            header::ORIGIN,
            HeaderValue::from_static("https://app.example.com/"),
        );
        ctx.origin = Some("https://app.example.com/".to_string());

        let response = ingress.handle(ctx).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(
            response
                .headers()
                .get("Access-Control-Allow-Origin")
                .unwrap(),
            "https://app.example.com/"
        );
        assert_eq!(
            response
                .headers()
                .get("Access-Control-Allow-Credentials")
                .unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn test_enforced_origin_rejects_unknown() {
        let calls = Arc::new(AtomicUsize::new(0));
        let config = AppConfig {
            enforce_origin_allowlist: true,
            ..AppConfig::default()
        };
        let ingress = Ingress::new(
            &config,
            ConnectionManager::new(Arc::new(HealthyStore)),
            test_router(calls.clone()),
        )
        .unwrap();

        let mut ctx = post("/api/things", "{}");
        ctx.origin = Some("https://evil.example.net".to_string());

        let response = ingress.handle(ctx).await;
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_permissive_origin_logs_but_allows() {
        let calls = Arc::new(AtomicUsize::new(0));
        let ingress = test_ingress(Arc::new(HealthyStore), calls.clone());

        let mut ctx = post("/api/things", "{}");
        ctx.origin = Some("https://evil.example.net".to_string());

        let response = ingress.handle(ctx).await;
        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rate_gate_rejects_over_quota() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut config = AppConfig::default();
        config.rate_limit.requests = 3;
        let ingress = Ingress::new(
            &config,
            ConnectionManager::new(Arc::new(HealthyStore)),
            test_router(calls.clone()),
        )
        .unwrap();

        for _ in 0..3 {
            let response = ingress.handle(post("/api/things", "{}")).await;
            assert_eq!(response.status(), StatusCode::CREATED);
        }
        let response = ingress.handle(post("/api/things", "{}")).await;
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
