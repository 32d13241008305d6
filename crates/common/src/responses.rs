//! Response builders shared by the gateway and counter HTTP servers.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Empty, Full};
use hyper::header::{HeaderMap, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde::Serialize;

use crate::consts::{JSON_CONTENT_TYPE, SESSION_ID_HEADER, TRACE_TOKEN_HEADER};
use crate::errors::ServiceError;

pub type ResponseBody = BoxBody<Bytes, hyper::Error>;

pub fn empty() -> ResponseBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

pub fn full<T: Into<Bytes>>(chunk: T) -> ResponseBody {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

pub fn status_response(status: StatusCode) -> Response<ResponseBody> {
    let mut response = Response::new(empty());
    *response.status_mut() = status;
    response
}

pub fn json_response<T: Serialize>(status: StatusCode, value: &T) -> Response<ResponseBody> {
    let json = match serde_json::to_vec(value) {
        Ok(json) => json,
        Err(err) => {
            return ServiceError::InternalServerError(format!("failed to serialize response: {err}"))
                .into_response()
        }
    };

    let mut response = Response::new(full(json));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        hyper::header::HeaderValue::from_static(JSON_CONTENT_TYPE),
    );
    response
}

/// Copy the inbound trace and session headers onto the response.
pub fn echo_trace_headers(inbound: &HeaderMap, response: &mut Response<ResponseBody>) {
    for key in [TRACE_TOKEN_HEADER, SESSION_ID_HEADER] {
        if let Some(value) = inbound.get(key) {
            response.headers_mut().insert(key, value.clone());
        }
    }
}
