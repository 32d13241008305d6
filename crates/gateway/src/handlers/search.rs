use std::time::Instant;

use common::consts::GATEWAY_SEARCH_PREFIX;
use common::errors::ServiceError;
use common::lexicon::{SearchQuery, SearchResponse};
use common::responses::{json_response, ResponseBody};
use common::traces::{RequestMetadata, SpanPayload};
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::HOST;
use hyper::{Request, Response, StatusCode};
use tracing::{info, info_span, warn, Instrument};

use crate::dispatch::{SearchKind, UnknownSearchKind};
use crate::orchestrator::Gateway;

/// `POST /alexandros/v1/search/{kind}` with a JSON [`SearchQuery`] body.
pub async fn search(
    req: Request<Incoming>,
    gateway: &Gateway,
) -> Result<Response<ResponseBody>, hyper::Error> {
    let inbound = RequestMetadata::from_headers(req.headers());
    let span = info_span!("search", trace_id = %inbound.trace.trace_id);

    async move {
        let started = Instant::now();
        let path = req.uri().path().to_string();
        let kind_segment = path
            .strip_prefix(GATEWAY_SEARCH_PREFIX)
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_string();

        gateway.spans().emit_detached(
            &inbound.trace,
            SpanPayload::RequestStart {
                method: req.method().to_string(),
                url: path.clone(),
                host: req
                    .headers()
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .unwrap_or_default()
                    .to_string(),
                operation: kind_segment.clone(),
            },
        );

        let body = req.into_body().collect().await?.to_bytes();

        let response = match dispatch(&kind_segment, &body, &inbound, gateway).await {
            Ok(response) => json_response(StatusCode::OK, &response),
            Err(err) => {
                warn!(kind = %kind_segment, error = %err, "search failed");
                err.into_response()
            }
        };

        let took_ms = started.elapsed().as_millis() as u64;
        info!(
            kind = %kind_segment,
            status = response.status().as_u16(),
            took_ms,
            "search handled"
        );
        gateway.spans().emit_detached(
            &inbound.trace,
            SpanPayload::RequestStop {
                response_code: response.status().as_u16(),
                took_ms,
            },
        );

        Ok(response)
    }
    .instrument(span)
    .await
}

async fn dispatch(
    kind_segment: &str,
    body: &[u8],
    inbound: &RequestMetadata,
    gateway: &Gateway,
) -> Result<SearchResponse, ServiceError> {
    let kind: SearchKind = kind_segment
        .parse()
        .map_err(|err: UnknownSearchKind| ServiceError::InvalidRequest(err.to_string()))?;

    let query: SearchQuery = serde_json::from_slice(body)
        .map_err(|err| ServiceError::InvalidRequest(format!("invalid search body: {err}")))?;

    gateway.search(kind, query, inbound).await
}
