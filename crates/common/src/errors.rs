use std::time::Duration;

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::{Error as HyperError, Response, StatusCode};
use serde_json::json;
use thiserror::Error;

/// Errors of an outbound call to another service.
///
/// Connection-class errors (`Unavailable`, `DeadlineExceeded`) are
/// transport flakiness and may be retried once after a reconnect. Every
/// other variant is application-class and is surfaced as-is.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("service unavailable at `{address}`: {reason}")]
    Unavailable { address: String, reason: String },

    #[error("deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("failed to dial `{address}`: {reason}")]
    Dial { address: String, reason: String },

    #[error("upstream application error status={status}, body={body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("service `{0}` reported unhealthy")]
    Unhealthy(String),
}

impl RpcError {
    pub fn is_connection_class(&self) -> bool {
        matches!(
            self,
            RpcError::Unavailable { .. } | RpcError::DeadlineExceeded(_)
        )
    }

    /// Classify a transport error from `reqwest`.
    pub fn from_reqwest(address: &str, timeout: Duration, err: reqwest::Error) -> Self {
        if err.is_timeout() {
            RpcError::DeadlineExceeded(timeout)
        } else if err.is_connect() || err.is_request() {
            RpcError::Unavailable {
                address: address.to_string(),
                reason: err.to_string(),
            }
        } else if err.is_decode() {
            RpcError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            RpcError::Status {
                status: status.as_u16(),
                body: err.to_string(),
            }
        } else {
            RpcError::Unavailable {
                address: address.to_string(),
                reason: err.to_string(),
            }
        }
    }

    /// Classify a non-success HTTP status. 503 and 504 are the transport
    /// layer's way of saying unavailable / timed out.
    pub fn from_status(address: &str, timeout: Duration, status: u16, body: String) -> Self {
        match status {
            503 => RpcError::Unavailable {
                address: address.to_string(),
                reason: body,
            },
            504 => RpcError::DeadlineExceeded(timeout),
            _ => RpcError::Status { status, body },
        }
    }
}

// -----------------------------------------------------------------------------
// Service Errors (HTTP facing)
// -----------------------------------------------------------------------------
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream call failed: {0}")]
    Upstream(#[from] RpcError),

    #[error("Service not available: {0}")]
    NotConfigured(String),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Upstream(RpcError::Unavailable { .. })
            | ServiceError::Upstream(RpcError::Dial { .. })
            | ServiceError::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Upstream(RpcError::DeadlineExceeded(_)) => StatusCode::GATEWAY_TIMEOUT,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn into_response(self) -> Response<BoxBody<Bytes, HyperError>> {
        let status = self.status_code();
        let (code, details) = match &self {
            ServiceError::InvalidRequest(reason) => ("InvalidRequest", json!({ "reason": reason })),
            ServiceError::NotFound(what) => ("NotFound", json!({ "resource": what })),
            ServiceError::Upstream(err) => (
                "UpstreamError",
                json!({ "reason": err.to_string(), "retryable": err.is_connection_class() }),
            ),
            ServiceError::NotConfigured(what) => ("NotConfigured", json!({ "service": what })),
            ServiceError::InternalServerError(reason) => {
                ("InternalServerError", json!({ "reason": reason }))
            }
        };

        let body_json = json!({
            "error": {
                "code": code,
                "message": self.to_string(),
                "details": details
            }
        });

        let boxed_body = Full::new(Bytes::from(body_json.to_string()))
            .map_err(|never| match never {})
            .boxed();

        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(boxed_body)
            .unwrap_or_else(|_| {
                Response::new(
                    Full::new(Bytes::from("Internal Error"))
                        .map_err(|never| match never {})
                        .boxed(),
                )
            })
    }
}
