use common::responses::{json_response, ResponseBody};
use common::traces::RequestMetadata;
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};

use crate::orchestrator::Gateway;

pub fn ping(gateway: &Gateway) -> Response<ResponseBody> {
    json_response(StatusCode::OK, &gateway.ping())
}

/// Aggregated backend health. Always answers 200; the body carries the
/// verdict.
pub async fn health(headers: &HeaderMap, gateway: &Gateway) -> Response<ResponseBody> {
    let inbound = RequestMetadata::from_headers(headers);
    let health = gateway.health(&inbound).await;
    json_response(StatusCode::OK, &health)
}
