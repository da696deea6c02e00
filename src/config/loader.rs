use config::{Config, Environment};
use eyre::{Context, Result};

use crate::config::models::AppConfig;

/// Load configuration from `PORTICO_`-prefixed environment variables using
/// the config crate. Nested fields use `__` as the separator, e.g.
/// `PORTICO_RATE_LIMIT__REQUESTS=200`. Unset fields fall back to serde
/// defaults.
pub fn load_config() -> Result<AppConfig> {
    load_from_source(Environment::with_prefix("PORTICO").separator("__"))
}

/// Load and validate from an arbitrary config source. Exposed separately so
/// tests can feed explicit values instead of mutating the process
/// environment.
pub fn load_from_source<S>(source: S) -> Result<AppConfig>
where
    S: config::Source + Send + Sync + 'static,
{
    let settings = Config::builder()
        .add_source(source)
        .build()
        .context("Failed to build configuration")?;

    let app_config: AppConfig = settings
        .try_deserialize()
        .context("Failed to deserialize configuration from environment")?;

    app_config
        .validate()
        .map_err(|e| eyre::eyre!("Invalid configuration: {e}"))?;

    Ok(app_config)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::config::models::RuntimeMode;

    fn source(pairs: &[(&str, &str)]) -> config::Config {
        let map: HashMap<String, config::Value> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), config::Value::from(v.to_string())))
            .collect();
        let mut builder = Config::builder();
        for (key, value) in map {
            builder = builder.set_override(key, value).unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_empty_environment_yields_defaults() {
        let config = load_from_source(source(&[])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.frontend_url, "http://localhost:3000");
        assert_eq!(config.runtime_mode, RuntimeMode::Development);
    }

    #[test]
    fn test_overrides_are_applied() {
        let config = load_from_source(source(&[
            ("port", "8080"),
            ("frontend_url", "https://app.example.com"),
            ("runtime_mode", "production"),
            ("rate_limit.requests", "250"),
            ("rate_limit.window", "1m"),
        ]))
        .unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.frontend_url, "https://app.example.com");
        assert_eq!(config.runtime_mode, RuntimeMode::Production);
        assert_eq!(config.rate_limit.requests, 250);
        assert_eq!(config.rate_limit.window, "1m");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let result = load_from_source(source(&[("rate_limit.requests", "0")]));
        assert!(result.is_err());

        let result = load_from_source(source(&[("rate_limit.window", "soon")]));
        assert!(result.is_err());
    }
}
