//! Router dispatch: the pipeline's single extension point.
//!
//! Business-logic handlers are external collaborators registered by
//! method+path under the `/api` prefix. The registry is backed by one
//! `matchit::Router` per method; a validated, policy-cleared request is
//! delegated to the matching handler and any error it raises propagates
//! unchanged to the error normalizer.
use std::{collections::HashMap, sync::Arc};

use futures_util::future::BoxFuture;
use http::{HeaderMap, Method, StatusCode};
use serde_json::Value;

use crate::core::error::IngressError;

/// Path prefix all registered routes live under.
pub const API_PREFIX: &str = "/api";

/// What a route handler receives: the validated request with its payload
/// already parsed by the request normalizer.
#[derive(Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Full request path, including the `/api` prefix.
    pub path: String,
    /// Route parameters matched from the registered pattern.
    pub params: HashMap<String, String>,
    pub headers: HeaderMap,
    /// Parsed body, if the request carried a decodable one.
    pub payload: Option<Value>,
    /// Client identity (source address) as seen by the rate gate.
    pub client: String,
}

/// What a route handler returns on success.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ApiResponse {
    pub fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn created(body: Value) -> Self {
        Self {
            status: StatusCode::CREATED,
            body,
        }
    }
}

/// A registered route handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, request: ApiRequest) -> BoxFuture<'static, Result<ApiResponse, IngressError>>;
}

impl<F, Fut> Handler for F
where
    F: Fn(ApiRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ApiResponse, IngressError>> + Send + 'static,
{
    fn call(&self, request: ApiRequest) -> BoxFuture<'static, Result<ApiResponse, IngressError>> {
        Box::pin(self(request))
    }
}

/// Handler registry keyed by method, each holding a radix-tree router over
/// the path patterns registered beneath [`API_PREFIX`].
#[derive(Default)]
pub struct ApiRouter {
    routes: HashMap<Method, matchit::Router<Arc<dyn Handler>>>,
}

impl ApiRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for `method` and `path` (path relative to the
    /// `/api` prefix, e.g. `/users/{id}`).
    pub fn route<H>(mut self, method: Method, path: &str, handler: H) -> Self
    where
        H: Handler,
    {
        let full_path = format!("{API_PREFIX}{path}");
        let router = self.routes.entry(method.clone()).or_default();
        if let Err(error) = router.insert(full_path.clone(), Arc::new(handler)) {
            // Conflicting registrations are a programming error caught at
            // startup, not at request time.
            panic!("conflicting route registration {method} {full_path}: {error}");
        }
        self
    }

    /// Dispatch a request to the matching handler. Unmatched method+path is
    /// a NotFound failure.
    pub async fn dispatch(
        &self,
        method: &Method,
        path: &str,
        headers: HeaderMap,
        payload: Option<Value>,
        client: String,
    ) -> Result<ApiResponse, IngressError> {
        let router = self
            .routes
            .get(method)
            .ok_or_else(|| IngressError::NotFound(format!("{method} {path}")))?;
        let matched = router
            .at(path)
            .map_err(|_| IngressError::NotFound(format!("{method} {path}")))?;

        let params = matched
            .params
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let handler = matched.value.clone();

        handler
            .call(ApiRequest {
                method: method.clone(),
                path: path.to_string(),
                params,
                headers,
                payload,
                client,
            })
            .await
    }
}
