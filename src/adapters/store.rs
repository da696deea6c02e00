//! TCP-reachability store connector for the binary.
//!
//! The pipeline treats the backing store as a black box behind the
//! [`StoreConnector`] port; this adapter considers the connection
//! established once a TCP session to the configured address succeeds.
use async_trait::async_trait;
use tokio::{net::TcpStream, time::timeout};

use crate::ports::store::{StoreConnector, StoreError};

const CONNECT_TIMEOUT_SECS: u64 = 10;

pub struct TcpStoreConnector {
    addr: String,
}

impl TcpStoreConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

#[async_trait]
impl StoreConnector for TcpStoreConnector {
    async fn connect(&self) -> Result<(), StoreError> {
        let attempt = timeout(
            std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS),
            TcpStream::connect(&self.addr),
        );
        match attempt.await {
            Ok(Ok(_stream)) => {
                tracing::info!(addr = %self.addr, "Backing store reachable");
                Ok(())
            }
            Ok(Err(error)) => Err(StoreError::ConnectionError(format!(
                "{addr}: {error}",
                addr = self.addr
            ))),
            Err(_) => Err(StoreError::Timeout(CONNECT_TIMEOUT_SECS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tokio::net::TcpListener;

    use super::*;

    #[tokio::test]
    async fn test_connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let connector = TcpStoreConnector::new(addr.to_string());
        assert!(connector.connect().await.is_ok());
    }

    #[tokio::test]
    async fn test_refused_connection_is_error() {
        // Bind then drop to obtain a port that is very likely closed.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let connector = TcpStoreConnector::new(addr.to_string());
        assert!(matches!(
            connector.connect().await,
            Err(StoreError::ConnectionError(_))
        ));
    }
}
