//! Configuration data structures for Portico.
//!
//! These types are populated from environment variables (see
//! [`crate::config::loader`]) and are intentionally serde-friendly with
//! defaults, so a bare environment yields a runnable development setup.
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default listen port.
fn default_port() -> u16 {
    5000
}

/// Default frontend base URL; also the fixed local-development origin that is
/// always part of the allowlist.
fn default_frontend_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_store_addr() -> String {
    "127.0.0.1:27017".to_string()
}

/// Default maximum request body size: 10 MiB.
fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Runtime mode, controlling how much error detail is exposed to clients and
/// which log format is used.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeMode {
    #[default]
    Development,
    Production,
}

impl RuntimeMode {
    pub fn is_development(self) -> bool {
        self == RuntimeMode::Development
    }
}

/// Rate limiting configuration for the per-identity fixed window.
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Maximum number of admitted requests per identity per window.
    pub requests: u64,
    /// Window duration as a humantime string (e.g. "15m", "1s").
    pub window: String,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window: "15m".to_string(),
        }
    }
}

impl RateLimitConfig {
    /// Parse the configured window duration.
    pub fn window_duration(&self) -> Result<Duration, String> {
        humantime::parse_duration(&self.window)
            .map_err(|e| format!("Invalid rate limit window '{}': {e}", self.window))
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct AppConfig {
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Base URL of the frontend allowed to make cross-origin requests.
    pub frontend_url: String,
    /// Development vs. production behavior (error detail exposure, log format).
    pub runtime_mode: RuntimeMode,
    /// Whether a non-allowlisted Origin header rejects the request (403) or is
    /// merely logged. Defaults to log-only.
    pub enforce_origin_allowlist: bool,
    /// Address of the backing store, used by the connection gate.
    pub store_addr: String,
    pub rate_limit: RateLimitConfig,
    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            frontend_url: default_frontend_url(),
            runtime_mode: RuntimeMode::default(),
            enforce_origin_allowlist: false,
            store_addr: default_store_addr(),
            rate_limit: RateLimitConfig::default(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl AppConfig {
    /// Validate cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.rate_limit.requests == 0 {
            return Err("Rate limit 'requests' must be greater than 0".to_string());
        }
        self.rate_limit.window_duration()?;
        url::Url::parse(&self.frontend_url)
            .map_err(|e| format!("Invalid frontend_url '{}': {e}", self.frontend_url))?;
        if self.max_body_bytes == 0 {
            return Err("max_body_bytes must be greater than 0".to_string());
        }
        Ok(())
    }
}
