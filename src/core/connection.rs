//! Connection gating for a cold-start-sensitive hosting model.
//!
//! The process may be created fresh per request (serverless) or long-lived,
//! so the backing-store connection is established lazily on the first
//! request and cached for the process lifetime. The gate holds a tagged
//! state (`NotStarted` / `InFlight` / `Established`); concurrent first
//! callers share a single in-flight attempt via a cloned [`Shared`] future,
//! guaranteeing at most one underlying establishment. A failed attempt
//! resets the state so the next request retries; deliberately no backoff,
//! since the host may tear the process down between requests anyway.
use std::sync::Arc;

use futures_util::{
    FutureExt,
    future::{BoxFuture, Shared},
};
use tokio::sync::Mutex;

use crate::{
    core::error::IngressError,
    ports::store::{StoreConnector, StoreError},
};

/// Cloneable establishment result, required because a [`Shared`] future
/// hands the same output to every awaiter.
type SharedAttempt = Shared<BoxFuture<'static, Result<(), Arc<StoreError>>>>;

enum ConnState {
    NotStarted,
    InFlight(SharedAttempt),
    Established,
}

/// Owns the backing-store connection lifecycle. Dependency-injected into the
/// pipeline; cheap to share via `Arc`.
pub struct ConnectionManager {
    connector: Arc<dyn StoreConnector>,
    state: Mutex<ConnState>,
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn StoreConnector>) -> Self {
        Self {
            connector,
            state: Mutex::new(ConnState::NotStarted),
        }
    }

    /// Idempotent per-request gate. Returns immediately once established;
    /// otherwise joins (or starts) the single in-flight attempt.
    pub async fn ensure_connected(&self) -> Result<(), IngressError> {
        let attempt = {
            let mut state = self.state.lock().await;
            match &*state {
                ConnState::Established => return Ok(()),
                ConnState::InFlight(shared) => shared.clone(),
                ConnState::NotStarted => {
                    let connector = self.connector.clone();
                    let shared: SharedAttempt = async move {
                        connector.connect().await.map_err(Arc::new)
                    }
                    .boxed()
                    .shared();
                    *state = ConnState::InFlight(shared.clone());
                    tracing::info!("Establishing backing store connection");
                    shared
                }
            }
        };

        let result = attempt.clone().await;

        let mut state = self.state.lock().await;
        match result {
            Ok(()) => {
                if !matches!(*state, ConnState::Established) {
                    tracing::info!("Backing store connection established");
                    *state = ConnState::Established;
                }
                Ok(())
            }
            Err(error) => {
                // Only reset the attempt we awaited; a newer in-flight
                // attempt started by a later request must not be clobbered.
                if let ConnState::InFlight(current) = &*state
                    && Shared::ptr_eq(current, &attempt)
                {
                    *state = ConnState::NotStarted;
                }
                tracing::error!(error = %error, "Backing store connection failed");
                Err(IngressError::ServiceUnavailable(error.to_string()))
            }
        }
    }

    /// Whether the connection has been established (diagnostics only).
    pub async fn is_established(&self) -> bool {
        matches!(*self.state.lock().await, ConnState::Established)
    }
}
