use std::sync::Arc;

use common::configuration::{BackendConfig, GatewayConfig};
use common::consts::SPANS_PATH;
use common::errors::RpcError;
use common::traces::{SpanEmitter, StreamSpanSink};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::clients::http::JsonEndpoint;
use crate::clients::{
    CounterClient, DialFn, HealthCheck, ResilientClient, SearchBackendClient,
};
use crate::dispatch::{SearchKind, SearchRouter};
use crate::health::HealthAggregator;
use crate::orchestrator::Gateway;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("required backend `{name}` is not usable: {source}")]
    RequiredBackend {
        name: &'static str,
        #[source]
        source: RpcError,
    },
}

/// Dial with bounded retries, then poll health until it reports healthy or
/// the configured timeout runs out.
async fn connect_dependency<T>(
    name: &str,
    address: &str,
    dial: DialFn<T>,
    config: &GatewayConfig,
) -> Result<ResilientClient<T>, RpcError>
where
    T: HealthCheck + 'static,
{
    let client = ResilientClient::connect_with_retry(
        address,
        dial,
        config.request_timeout(),
        config.dial_attempts,
        config.dial_retry_delay(),
    )
    .await?;

    if client
        .wait_for_healthy_state(config.health_timeout(), config.health_poll_interval())
        .await
    {
        info!(service = %name, address = %client.address(), "dependency healthy");
        Ok(client)
    } else {
        Err(RpcError::Unhealthy(name.to_string()))
    }
}

/// Tracing is optional: an absent or unusable collector means no spans.
async fn connect_tracing(config: &GatewayConfig) -> SpanEmitter {
    let Some(address) = config.tracing_collector.as_deref() else {
        info!("no tracing collector configured, tracing disabled");
        return SpanEmitter::disabled();
    };

    let timeout = config.request_timeout();
    let dial: DialFn<JsonEndpoint> = Arc::new(move |addr| JsonEndpoint::dial(addr, timeout));
    match connect_dependency("tracing", address, dial, config).await {
        Ok(_) => {
            let url = format!("{}{}", address.trim_end_matches('/'), SPANS_PATH);
            let sink = StreamSpanSink::open(reqwest::Client::new(), url, config.stream_buffer);
            SpanEmitter::new(Arc::new(sink))
        }
        Err(err) => {
            warn!(
                address = %address,
                error = %err,
                "tracing collector unavailable, starting without traces"
            );
            SpanEmitter::disabled()
        }
    }
}

/// The counter is optional too: without it searches are served but not
/// counted, and counter queries answer 503.
async fn connect_counter(config: &GatewayConfig, gateway: Gateway) -> Gateway {
    let Some(address) = config.counter.as_deref() else {
        info!("no counter service configured, usage counting disabled");
        return gateway;
    };

    let dial = CounterClient::dialer(config.request_timeout());
    let client = match connect_dependency("counter", address, dial, config).await {
        Ok(client) => client,
        Err(err) => {
            warn!(
                address = %address,
                error = %err,
                "counter unavailable, starting without counter"
            );
            return gateway;
        }
    };

    match CounterClient::dial(address, config.request_timeout()) {
        Ok(publisher) => {
            let usage = publisher.open_publisher(config.stream_buffer);
            gateway.with_counter(Arc::new(client), Arc::new(usage))
        }
        Err(err) => {
            warn!(address = %address, error = %err, "failed to open counter stream");
            gateway
        }
    }
}

/// Connect one search backend, applying its `required` policy. An optional
/// backend that is dialed but unhealthy is still routed to, degraded.
async fn connect_backend(
    name: &'static str,
    backend: &BackendConfig,
    config: &GatewayConfig,
) -> Result<Option<Arc<ResilientClient<SearchBackendClient>>>, StartupError> {
    let dial = SearchBackendClient::dialer(config.request_timeout());

    match connect_dependency(name, &backend.address, dial.clone(), config).await {
        Ok(client) => Ok(Some(Arc::new(client))),
        Err(source) if backend.required => {
            error!(
                service = %name,
                address = %backend.address,
                error = %source,
                "required backend unavailable"
            );
            Err(StartupError::RequiredBackend { name, source })
        }
        Err(err) => {
            warn!(
                service = %name,
                address = %backend.address,
                error = %err,
                "optional backend unavailable, starting degraded"
            );
            Ok(ResilientClient::connect(&backend.address, dial, config.request_timeout())
                .ok()
                .map(Arc::new))
        }
    }
}

/// Build the gateway from configuration: tracing first, then the counter,
/// then every search backend.
pub async fn bootstrap(config: &GatewayConfig) -> Result<Gateway, StartupError> {
    let spans = connect_tracing(config).await;

    let mut router = SearchRouter::new();
    let mut health = HealthAggregator::new(config.version.clone(), config.health_timeout());

    for (kind, (name, backend)) in SearchKind::ALL.into_iter().zip(config.backend_entries()) {
        if let Some(client) = connect_backend(name, backend, config).await? {
            router = router.with_route(kind, client.clone());
            health = health.with_backend(name, client);
        }
    }

    let gateway = Gateway::new(router, health, config.version.clone()).with_spans(spans);
    Ok(connect_counter(config, gateway).await)
}
