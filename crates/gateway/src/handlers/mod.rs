use std::sync::Arc;

use common::consts::{
    GATEWAY_COUNTER_PREFIX, GATEWAY_HEALTH_PATH, GATEWAY_PING_PATH, GATEWAY_SEARCH_PREFIX,
    LIVENESS_PATH,
};
use common::responses::{echo_trace_headers, status_response, ResponseBody};
use hyper::body::Incoming;
use hyper::{Method, Request, Response, StatusCode};
use tracing::debug;

use crate::orchestrator::Gateway;

pub mod counter;
pub mod search;
pub mod status;

/// Route one inbound request. Trace and session headers are echoed on
/// every response.
pub async fn route(
    req: Request<Incoming>,
    gateway: Arc<Gateway>,
) -> Result<Response<ResponseBody>, hyper::Error> {
    let inbound_headers = req.headers().clone();
    let path = req.uri().path().to_string();

    let mut response = match (req.method(), path.as_str()) {
        (&Method::GET, LIVENESS_PATH | GATEWAY_PING_PATH) => status::ping(&gateway),
        (&Method::GET, GATEWAY_HEALTH_PATH) => status::health(&inbound_headers, &gateway).await,
        (&Method::POST, p) if p.starts_with(GATEWAY_SEARCH_PREFIX) => {
            search::search(req, &gateway).await?
        }
        (&Method::GET, p) if p.starts_with(GATEWAY_COUNTER_PREFIX) => {
            counter::top_five(&path, &inbound_headers, &gateway).await
        }
        _ => {
            debug!(method = %req.method(), path = %path, "no route found");
            status_response(StatusCode::NOT_FOUND)
        }
    };

    echo_trace_headers(&inbound_headers, &mut response);
    Ok(response)
}
