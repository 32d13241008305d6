use std::sync::Arc;

use common::configuration::CounterConfig;
use common::consts::SPANS_PATH;
use common::logging::init_logging;
use common::traces::{SpanEmitter, StreamSpanSink};
use counter::service::{serve, CounterService};
use counter::store::CounterStore;
use tokio::net::TcpListener;
use tracing::info;

fn span_emitter(config: &CounterConfig) -> SpanEmitter {
    match config.tracing_collector.as_deref() {
        Some(address) => {
            let url = format!("{}{}", address.trim_end_matches('/'), SPANS_PATH);
            info!(collector = %url, "streaming spans to collector");
            let sink = StreamSpanSink::open(reqwest::Client::new(), url, config.stream_buffer);
            SpanEmitter::new(Arc::new(sink))
        }
        None => {
            info!("no tracing collector configured, tracing disabled");
            SpanEmitter::disabled()
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    init_logging("counter");

    let config = CounterConfig::load()?;
    info!(
        bind_address = %config.bind_address,
        version = %config.version,
        "loaded counter configuration"
    );

    let service = Arc::new(CounterService::new(
        CounterStore::new(),
        span_emitter(&config),
        config.version.clone(),
    ));

    let listener = TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "counter listening");

    serve(listener, service).await?;
    Ok(())
}
