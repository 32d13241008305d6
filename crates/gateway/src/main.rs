use std::sync::Arc;

use common::configuration::GatewayConfig;
use common::logging::init_logging;
use gateway::handlers::route;
use gateway::startup::bootstrap;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging("gateway");

    let config = GatewayConfig::load()?;
    info!(
        bind_address = %config.bind_address,
        version = %config.version,
        "loaded gateway configuration"
    );

    let gateway = match bootstrap(&config).await {
        Ok(gateway) => Arc::new(gateway),
        Err(err) => {
            error!(error = %err, "gateway startup failed");
            return Err(err.into());
        }
    };

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "gateway listening");

    loop {
        let (stream, _) = listener.accept().await?;
        let peer_addr = stream.peer_addr()?;
        let io = TokioIo::new(stream);

        let gateway = Arc::clone(&gateway);
        let service = service_fn(move |req| route(req, Arc::clone(&gateway)));

        tokio::task::spawn(async move {
            debug!(peer = ?peer_addr, "accepted connection");
            if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                warn!(error = ?err, "error serving connection");
            }
        });
    }
}
