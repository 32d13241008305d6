use common::consts::GATEWAY_COUNTER_PREFIX;
use common::errors::ServiceError;
use common::responses::{json_response, ResponseBody};
use common::traces::RequestMetadata;
use hyper::header::HeaderMap;
use hyper::{Response, StatusCode};

use crate::orchestrator::{Gateway, TopFiveQuery};

/// `/top-five`, `/top-five/session/{id}` or `/top-five/service/{name}`
/// below the gateway's counter prefix.
pub fn parse_top_five_path(path: &str) -> Result<TopFiveQuery, ServiceError> {
    let rest = path
        .strip_prefix(GATEWAY_COUNTER_PREFIX)
        .unwrap_or(path)
        .trim_end_matches('/');

    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();
    match segments.as_slice() {
        ["top-five"] => Ok(TopFiveQuery::Global),
        ["top-five", "session", id] => Ok(TopFiveQuery::Session(decode_segment(id)?)),
        ["top-five", "service", name] => Ok(TopFiveQuery::Service(decode_segment(name)?)),
        _ => Err(ServiceError::NotFound(path.to_string())),
    }
}

fn decode_segment(segment: &str) -> Result<String, ServiceError> {
    urlencoding::decode(segment)
        .map(|decoded| decoded.into_owned())
        .map_err(|err| ServiceError::InvalidRequest(format!("invalid path segment: {err}")))
}

pub async fn top_five(
    path: &str,
    headers: &HeaderMap,
    gateway: &Gateway,
) -> Response<ResponseBody> {
    let query = match parse_top_five_path(path) {
        Ok(query) => query,
        Err(err) => return err.into_response(),
    };

    let inbound = RequestMetadata::from_headers(headers);
    match gateway.top_five(query, &inbound).await {
        Ok(response) => json_response(StatusCode::OK, &response),
        Err(err) => err.into_response(),
    }
}
