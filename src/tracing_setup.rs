use eyre::Result;
use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::models::RuntimeMode;

/// Initialize logging for the given runtime mode: structured JSON in
/// production, pretty console output in development.
pub fn init_tracing(mode: RuntimeMode) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match mode {
        RuntimeMode::Production => {
            Registry::default()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(false)
                        .with_span_list(true)
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
        RuntimeMode::Development => {
            Registry::default()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .init();
        }
    }

    tracing::info!(?mode, "Portico logging initialized");
    Ok(())
}
