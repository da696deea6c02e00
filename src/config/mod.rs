pub mod loader;
pub mod models;

pub use models::{AppConfig, RateLimitConfig, RuntimeMode};
