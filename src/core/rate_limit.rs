//! Per-identity fixed-window rate limiting.
//!
//! Keeps one `{count, window_start}` record per client identity in an
//! in-memory concurrent map. A record past its window expiry is reset in
//! place by the next request from that identity, which doubles as implicit
//! garbage collection; no sweep task runs. Best-effort abuse mitigation for
//! a single-process deployment, not exact accounting; records do not
//! survive a restart.
use std::time::Duration;

use scc::HashMap;
use tokio::time::Instant;

use crate::config::models::RateLimitConfig;

/// Outcome of an admission check.
#[derive(Debug, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    /// Quota exceeded; `retry_after` is the time left in the current window.
    Rejected { retry_after: Duration },
}

#[derive(Debug)]
struct WindowRecord {
    count: u64,
    window_start: Instant,
}

/// Fixed-window counter keyed by client identity (source address by
/// default). Threshold and window come from configuration.
pub struct RateGate {
    records: HashMap<String, WindowRecord>,
    threshold: u64,
    window: Duration,
}

impl RateGate {
    pub fn new(threshold: u64, window: Duration) -> Self {
        Self {
            records: HashMap::new(),
            threshold,
            window,
        }
    }

    pub fn from_config(config: &RateLimitConfig) -> Result<Self, String> {
        if config.requests == 0 {
            return Err("Rate limit 'requests' must be greater than 0".to_string());
        }
        Ok(Self::new(config.requests, config.window_duration()?))
    }

    /// Admit or reject one request from `identity`. The read-modify-write
    /// runs under a single map-entry lock with no await inside, so the
    /// increment-and-check cannot be split by task interleaving.
    pub async fn admit(&self, identity: &str) -> Admission {
        let now = Instant::now();
        loop {
            let updated = self
                .records
                .update_async(identity, |_, record| self.tick(record, now))
                .await;
            if let Some(admission) = updated {
                return admission;
            }

            // First request from this identity. Losing an insert race just
            // retries the update path.
            let fresh = WindowRecord {
                count: 1,
                window_start: now,
            };
            if self
                .records
                .insert_async(identity.to_string(), fresh)
                .await
                .is_ok()
            {
                return Admission::Allowed;
            }
        }
    }

    fn tick(&self, record: &mut WindowRecord, now: Instant) -> Admission {
        if now.duration_since(record.window_start) >= self.window {
            // Window elapsed: this request starts a fresh window.
            record.count = 1;
            record.window_start = now;
            return Admission::Allowed;
        }

        record.count += 1;
        if record.count > self.threshold {
            let elapsed = now.duration_since(record.window_start);
            Admission::Rejected {
                retry_after: self.window.saturating_sub(elapsed),
            }
        } else {
            Admission::Allowed
        }
    }

    /// Number of identities currently tracked (diagnostics only).
    pub fn tracked_identities(&self) -> usize {
        self.records.len()
    }
}
