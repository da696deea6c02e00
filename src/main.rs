use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use http::Method;
use portico::{
    ApiResponse, ApiRouter, Ingress, IngressError, TcpStoreConnector,
    adapters, config::loader::load_config, core::connection::ConnectionManager, tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Override the configured listen port.
    #[clap(short, long)]
    port: Option<u16>,
}

/// Route handlers are external collaborators; the binary registers a small
/// health route so the pipeline is exercisable out of the box.
fn register_routes() -> ApiRouter {
    ApiRouter::new().route(Method::GET, "/ping", |_req| async {
        Ok::<ApiResponse, IngressError>(ApiResponse::ok(serde_json::json!({ "pong": true })))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let mut config = load_config()?;
    if let Some(port) = args.port {
        config.port = port;
    }

    tracing_setup::init_tracing(config.runtime_mode)?;
    tracing::info!(
        port = config.port,
        mode = ?config.runtime_mode,
        enforce_origin = config.enforce_origin_allowlist,
        "Starting Portico"
    );

    let connection = ConnectionManager::new(Arc::new(TcpStoreConnector::new(
        config.store_addr.clone(),
    )));

    let ingress = Ingress::new(&config, connection, register_routes())
        .map_err(|e| eyre::eyre!("Failed to assemble ingress pipeline: {e}"))?;

    adapters::serve(Arc::new(ingress), config.port).await
}
