use async_trait::async_trait;
use thiserror::Error;

/// Error type for backing-store connection establishment.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The store could not be reached.
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Establishment timed out.
    #[error("Timeout error after {0} seconds")]
    Timeout(u64),
}

/// StoreConnector defines the port (interface) for establishing the single
/// backing-store connection the pipeline gates on.
#[async_trait]
pub trait StoreConnector: Send + Sync + 'static {
    /// Establish the connection to the backing store.
    ///
    /// Called at most once concurrently by the connection gate; invoked
    /// again only after a previous attempt failed.
    async fn connect(&self) -> Result<(), StoreError>;
}
