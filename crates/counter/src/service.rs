use std::sync::Arc;
use std::time::Instant;

use common::consts::{
    COUNTER_ENTRIES_PATH, COUNTER_TOP_FIVE_PATH, COUNTER_TOP_FIVE_SERVICE_PREFIX,
    COUNTER_TOP_FIVE_SESSION_PREFIX, HEALTH_PATH,
};
use common::counter::{CountCreationRequestSet, CountStreamResponse, TopFiveResponse};
use common::errors::ServiceError;
use common::lexicon::HealthResponse;
use common::responses::{echo_trace_headers, json_response, status_response, ResponseBody};
use common::timestamps::now_rfc3339;
use common::traces::{RequestMetadata, SpanEmitter, SpanPayload};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::store::CounterStore;

const ACK: &str = "Received";
/// Longest ingest line accepted. Anything longer is dropped up to its newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

pub struct CounterService {
    store: CounterStore,
    spans: SpanEmitter,
    version: String,
}

impl CounterService {
    pub fn new(store: CounterStore, spans: SpanEmitter, version: impl Into<String>) -> Self {
        Self {
            store,
            spans,
            version: version.into(),
        }
    }

    pub fn health(&self) -> HealthResponse {
        HealthResponse {
            healthy: true,
            time: now_rfc3339(),
            database_health: None,
            version: self.version.clone(),
        }
    }

    /// Apply one ingest line. Every event in the batch is stamped with the
    /// receive time.
    pub async fn apply_line(&self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }

        let set: CountCreationRequestSet = match serde_json::from_slice(line) {
            Ok(set) => set,
            Err(err) => {
                warn!(error = %err, "skipping malformed counter batch");
                return;
            }
        };

        let now = OffsetDateTime::now_utc();
        for request in &set.request {
            debug!(
                word = %request.word,
                service = %request.service_name,
                search_type = %request.search_type,
                "counting search"
            );
            self.store
                .increment(&request.session_id, &request.service_name, &request.word, now)
                .await;
        }
    }

    /// Consume an NDJSON ingest stream frame by frame, applying each line as
    /// soon as it is complete, and ack once the body ends.
    async fn ingest(&self, req: Request<Incoming>) -> Result<Response<ResponseBody>, hyper::Error> {
        let mut body = req.into_body();
        let mut pending: Vec<u8> = Vec::new();
        let mut discarding = false;
        let mut batches = 0usize;

        while let Some(frame) = body.frame().await {
            let Ok(data) = frame?.into_data() else {
                continue;
            };
            let mut data = &data[..];
            if discarding {
                let Some(newline) = data.iter().position(|b| *b == b'\n') else {
                    continue;
                };
                data = &data[newline + 1..];
                discarding = false;
            }
            pending.extend_from_slice(data);

            while let Some(newline) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=newline).collect();
                self.apply_line(&line).await;
                batches += 1;
            }

            if pending.len() > MAX_LINE_BYTES {
                warn!(
                    bytes = pending.len(),
                    limit = MAX_LINE_BYTES,
                    "dropping oversized counter batch"
                );
                pending.clear();
                discarding = true;
            }
        }
        if !pending.is_empty() {
            self.apply_line(&pending).await;
            batches += 1;
        }

        info!(batches, "counter stream closed");
        Ok(json_response(
            StatusCode::OK,
            &CountStreamResponse {
                ack: ACK.to_string(),
            },
        ))
    }

    async fn top_five(&self, path: &str) -> Result<TopFiveResponse, ServiceError> {
        let top_five = if path == COUNTER_TOP_FIVE_PATH {
            self.store.top_five_global().await
        } else if let Some(session) = path.strip_prefix(COUNTER_TOP_FIVE_SESSION_PREFIX) {
            self.store.top_five_for_session(&decode_segment(session)?).await
        } else if let Some(service) = path.strip_prefix(COUNTER_TOP_FIVE_SERVICE_PREFIX) {
            self.store.top_five_by_service(&decode_segment(service)?).await
        } else {
            return Err(ServiceError::NotFound(path.to_string()));
        };
        Ok(TopFiveResponse { top_five })
    }

    /// Query hop: answers from the store and, when sampled, closes the hop
    /// with a `RequestStop` span.
    async fn query(&self, path: &str, inbound: &RequestMetadata) -> Response<ResponseBody> {
        let started = Instant::now();
        let response = match self.top_five(path).await {
            Ok(top_five) => json_response(StatusCode::OK, &top_five),
            Err(err) => err.into_response(),
        };

        self.spans.emit_detached(
            &inbound.trace,
            SpanPayload::RequestStop {
                response_code: response.status().as_u16(),
                took_ms: started.elapsed().as_millis() as u64,
            },
        );
        response
    }
}

fn decode_segment(segment: &str) -> Result<String, ServiceError> {
    urlencoding::decode(segment.trim_end_matches('/'))
        .map(|decoded| decoded.into_owned())
        .map_err(|err| ServiceError::InvalidRequest(format!("invalid path segment: {err}")))
}

pub async fn route(
    req: Request<Incoming>,
    service: Arc<CounterService>,
) -> Result<Response<ResponseBody>, hyper::Error> {
    let inbound_headers = req.headers().clone();
    let inbound = RequestMetadata::from_headers(&inbound_headers);
    let path = req.uri().path().to_string();

    let mut response = match (req.method(), path.as_str()) {
        (&Method::GET, HEALTH_PATH) => json_response(StatusCode::OK, &service.health()),
        (&Method::POST, COUNTER_ENTRIES_PATH) => service.ingest(req).await?,
        (&Method::GET, p) if p.starts_with(COUNTER_TOP_FIVE_PATH) => {
            service.query(&path, &inbound).await
        }
        _ => {
            debug!(method = %req.method(), path = %path, "no route found");
            status_response(StatusCode::NOT_FOUND)
        }
    };

    echo_trace_headers(&inbound_headers, &mut response);
    Ok(response)
}

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, service: Arc<CounterService>) -> std::io::Result<()> {
    loop {
        let (stream, _) = listener.accept().await?;
        let peer_addr = stream.peer_addr()?;
        let io = TokioIo::new(stream);

        let service = Arc::clone(&service);
        let handler = service_fn(move |req| route(req, Arc::clone(&service)));

        tokio::task::spawn(async move {
            debug!(peer = ?peer_addr, "accepted connection");
            if let Err(err) = http1::Builder::new().serve_connection(io, handler).await {
                warn!(error = ?err, "error serving connection");
            }
        });
    }
}
