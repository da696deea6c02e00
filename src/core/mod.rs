pub mod body;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod origin;
pub mod pipeline;
pub mod rate_limit;

pub use pipeline::Ingress;
