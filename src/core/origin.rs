//! Origin allowlist policy for cross-origin requests.
//!
//! The allowlist is built once at startup from the configured frontend base
//! URL. Operators routinely disagree with themselves about trailing slashes,
//! so the builder generates the URL as-is, without a trailing slash, and
//! with a forced trailing slash, adds the fixed local-development origin,
//! then normalizes (exactly one trailing slash stripped) and deduplicates.
//! Comparison is exact equality against the normalized entries.
//!
//! Enforcement is an explicit choice: with `enforce = false` (the default) a
//! non-matching origin is only logged and the request proceeds; with
//! `enforce = true` it is rejected.

/// Origin always present in the allowlist so local frontends work without
/// configuration.
const LOCAL_DEV_ORIGIN: &str = "http://localhost:3000";

/// Strip exactly one trailing slash.
fn normalize(origin: &str) -> &str {
    origin.strip_suffix('/').unwrap_or(origin)
}

/// Immutable allowlist of normalized origins plus the enforcement flag.
pub struct OriginPolicy {
    allowlist: Vec<String>,
    enforce: bool,
}

impl OriginPolicy {
    /// Build the policy from the configured frontend base URL.
    pub fn new(frontend_url: &str, enforce: bool) -> Self {
        let variants = [
            frontend_url.to_string(),
            frontend_url.trim_end_matches('/').to_string(),
            format!("{}/", frontend_url.trim_end_matches('/')),
            LOCAL_DEV_ORIGIN.to_string(),
        ];

        let mut allowlist: Vec<String> = Vec::new();
        for variant in variants {
            let normalized = normalize(&variant).to_string();
            if !allowlist.contains(&normalized) {
                allowlist.push(normalized);
            }
        }

        tracing::info!(?allowlist, enforce, "Origin allowlist built");
        Self { allowlist, enforce }
    }

    /// Whether rejection is enabled for non-matching origins.
    pub fn enforces(&self) -> bool {
        self.enforce
    }

    /// An absent origin (non-browser client) is always allowed; a present
    /// one must match an allowlist entry after normalization.
    pub fn is_allowed(&self, origin: Option<&str>) -> bool {
        match origin {
            None => true,
            Some(origin) => {
                let normalized = normalize(origin);
                self.allowlist.iter().any(|entry| entry == normalized)
            }
        }
    }
}
