pub mod http_server;
pub mod middleware;
pub mod store;

pub use http_server::{build_router, serve};
pub use store::TcpStoreConnector;
