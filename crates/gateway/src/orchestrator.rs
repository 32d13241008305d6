use std::sync::Arc;
use std::time::Instant;

use common::counter::{CountCreationRequest, TopFiveResponse};
use common::errors::ServiceError;
use common::lexicon::{AggregatedHealth, Ping, SearchQuery, SearchResponse};
use common::timestamps::now_rfc3339;
use common::traces::{RequestMetadata, SpanEmitter, SpanPayload};
use tracing::{debug, warn};

use crate::clients::{CounterQueries, NoopUsageRecorder, UsageRecorder};
use crate::dispatch::{SearchDispatchRequest, SearchKind, SearchRouter};
use crate::health::HealthAggregator;

/// Which counter ranking to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TopFiveQuery {
    Global,
    Session(String),
    Service(String),
}

/// Everything one inbound request can touch: search routing, health
/// aggregation, the counter service and the span emitter.
#[derive(Clone)]
pub struct Gateway {
    router: SearchRouter,
    health: HealthAggregator,
    counter: Option<Arc<dyn CounterQueries>>,
    usage: Arc<dyn UsageRecorder>,
    spans: SpanEmitter,
    version: String,
}

impl Gateway {
    pub fn new(router: SearchRouter, health: HealthAggregator, version: impl Into<String>) -> Self {
        Self {
            router,
            health,
            counter: None,
            usage: Arc::new(NoopUsageRecorder),
            spans: SpanEmitter::disabled(),
            version: version.into(),
        }
    }

    pub fn with_counter(
        mut self,
        queries: Arc<dyn CounterQueries>,
        usage: Arc<dyn UsageRecorder>,
    ) -> Self {
        self.counter = Some(queries);
        self.usage = usage;
        self
    }

    pub fn with_spans(mut self, spans: SpanEmitter) -> Self {
        self.spans = spans;
        self
    }

    pub fn spans(&self) -> &SpanEmitter {
        &self.spans
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Dispatch one search under a child trace context. Only a successful
    /// dispatch is counted and traced, and both happen on a detached task
    /// after the result is already on its way back.
    pub async fn search(
        &self,
        kind: SearchKind,
        query: SearchQuery,
        inbound: &RequestMetadata,
    ) -> Result<SearchResponse, ServiceError> {
        if query.word.trim().is_empty() {
            return Err(ServiceError::InvalidRequest(
                "word must not be empty".to_string(),
            ));
        }

        let request = SearchDispatchRequest::new(query, inbound.child());

        let started = Instant::now();
        let response = self.router.dispatch(kind, &request).await?;
        let took_ms = started.elapsed().as_millis() as u64;

        self.record_success(kind, &request, inbound, took_ms);
        Ok(response)
    }

    fn record_success(
        &self,
        kind: SearchKind,
        request: &SearchDispatchRequest,
        inbound: &RequestMetadata,
        took_ms: u64,
    ) {
        let usage = Arc::clone(&self.usage);
        let spans = self.spans.clone();
        let parent = inbound.trace.clone();
        let child_span_id = request.trace.span_id.clone();
        let event = CountCreationRequest {
            word: request.word.clone(),
            service_name: kind.service_name().to_string(),
            search_type: kind.search_type().to_string(),
            session_id: request.session_id.clone(),
        };

        tokio::spawn(async move {
            usage.record(event);
            spans.emit_child(
                &parent,
                &child_span_id,
                SpanPayload::ServiceToService {
                    service: kind.service_name().to_string(),
                    method: "search".to_string(),
                    took_ms,
                },
            );
        });
    }

    pub async fn health(&self, inbound: &RequestMetadata) -> AggregatedHealth {
        self.health.aggregate(inbound).await
    }

    pub fn ping(&self) -> Ping {
        Ping {
            healthy: true,
            time: now_rfc3339(),
            version: self.version.clone(),
        }
    }

    pub async fn top_five(
        &self,
        query: TopFiveQuery,
        inbound: &RequestMetadata,
    ) -> Result<TopFiveResponse, ServiceError> {
        let Some(counter) = self.counter.as_ref() else {
            warn!("counter query received but counter service is not available");
            return Err(ServiceError::NotConfigured("counter".to_string()));
        };

        let outbound = inbound.child();
        debug!(query = ?query, trace_id = %outbound.trace.trace_id, "querying counter");

        let response = match &query {
            TopFiveQuery::Global => counter.top_five(&outbound).await?,
            TopFiveQuery::Session(session_id) => {
                counter.top_five_for_session(session_id, &outbound).await?
            }
            TopFiveQuery::Service(service_name) => {
                counter.top_five_for_service(service_name, &outbound).await?
            }
        };
        Ok(response)
    }
}
