use std::time::Duration;

use async_trait::async_trait;
use common::consts::HEALTH_PATH;
use common::errors::RpcError;
use common::lexicon::HealthResponse;
use common::traces::RequestMetadata;
use reqwest::{Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::resilient::HealthCheck;

/// One remote service reached with JSON over HTTP. Every call forwards the
/// request metadata as headers and maps failures onto [`RpcError`].
#[derive(Clone, Debug)]
pub struct JsonEndpoint {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
}

impl JsonEndpoint {
    /// Validates the address and builds the connection pool. Does not touch
    /// the network; readiness is checked separately through the health RPC.
    ///
    /// The pool itself only bounds connecting. The per-call deadline is set
    /// on each unary request, so streams opened on the same pool can stay up
    /// indefinitely.
    pub fn dial(address: &str, timeout: Duration) -> Result<Self, RpcError> {
        let base_url = Url::parse(address).map_err(|err| RpcError::Dial {
            address: address.to_string(),
            reason: err.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(RpcError::Dial {
                address: address.to_string(),
                reason: "address cannot be used as a base url".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|err| RpcError::Dial {
                address: address.to_string(),
                reason: err.to_string(),
            })?;

        Ok(Self {
            http,
            base_url,
            timeout,
        })
    }

    pub fn address(&self) -> &str {
        self.base_url.as_str()
    }

    /// The shared pool, without a total request deadline.
    pub fn http_client(&self) -> reqwest::Client {
        self.http.clone()
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    /// `prefix` followed by one percent-encoded path segment.
    pub fn url_with_segment(&self, prefix: &str, segment: &str) -> String {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(prefix.split('/').filter(|s| !s.is_empty()))
                .push(segment);
        }
        url.to_string()
    }

    pub async fn get<R>(&self, path: &str, metadata: &RequestMetadata) -> Result<R, RpcError>
    where
        R: DeserializeOwned,
    {
        self.call::<(), R>(Method::GET, self.url(path), None, metadata)
            .await
    }

    pub async fn get_url<R>(&self, url: String, metadata: &RequestMetadata) -> Result<R, RpcError>
    where
        R: DeserializeOwned,
    {
        self.call::<(), R>(Method::GET, url, None, metadata).await
    }

    pub async fn post<B, R>(
        &self,
        path: &str,
        body: &B,
        metadata: &RequestMetadata,
    ) -> Result<R, RpcError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        self.call(Method::POST, self.url(path), Some(body), metadata)
            .await
    }

    async fn call<B, R>(
        &self,
        method: Method,
        url: String,
        body: Option<&B>,
        metadata: &RequestMetadata,
    ) -> Result<R, RpcError>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let address = self.address();
        let mut request = self
            .http
            .request(method, url)
            .timeout(self.timeout)
            .headers(metadata.to_headers());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| RpcError::from_reqwest(address, self.timeout, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RpcError::from_status(address, self.timeout, status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|err| RpcError::from_reqwest(address, self.timeout, err))?;
        serde_json::from_slice(&bytes).map_err(|err| RpcError::Decode(err.to_string()))
    }
}

/// Every service in the mesh answers the health RPC at the same path.
#[async_trait]
impl HealthCheck for JsonEndpoint {
    async fn health(&self, metadata: &RequestMetadata) -> Result<HealthResponse, RpcError> {
        self.get(HEALTH_PATH, metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dial_rejects_malformed_address() {
        let result = JsonEndpoint::dial("exact:50060 with spaces", Duration::from_secs(1));
        assert!(matches!(result, Err(RpcError::Dial { .. })));
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let endpoint = JsonEndpoint::dial("http://exact:50060/", Duration::from_secs(1)).unwrap();
        assert_eq!(endpoint.url("/v1/search"), "http://exact:50060/v1/search");
    }

    #[test]
    fn test_segment_is_percent_encoded() {
        let endpoint = JsonEndpoint::dial("http://counter:50053", Duration::from_secs(1)).unwrap();
        assert_eq!(
            endpoint.url_with_segment("/v1/top-five/session/", "a b/c"),
            "http://counter:50053/v1/top-five/session/a%20b%2Fc"
        );
    }
}
