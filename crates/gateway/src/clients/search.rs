use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::consts::SEARCH_PATH;
use common::errors::RpcError;
use common::lexicon::{HealthResponse, SearchQuery, SearchResult};
use common::traces::RequestMetadata;

use super::http::JsonEndpoint;
use super::resilient::{DialFn, HealthCheck, ResilientClient};

/// A search backend: one variant of the lexicon search (exact, fuzzy, ...).
#[async_trait]
pub trait SearchBackend: HealthCheck {
    async fn search(
        &self,
        query: &SearchQuery,
        metadata: &RequestMetadata,
    ) -> Result<SearchResult, RpcError>;
}

/// Plain client for one search backend, without any retry behaviour.
pub struct SearchBackendClient {
    endpoint: JsonEndpoint,
}

impl SearchBackendClient {
    pub fn dial(address: &str, timeout: Duration) -> Result<Self, RpcError> {
        Ok(Self {
            endpoint: JsonEndpoint::dial(address, timeout)?,
        })
    }

    pub fn dialer(timeout: Duration) -> DialFn<Self> {
        Arc::new(move |address| Self::dial(address, timeout))
    }
}

#[async_trait]
impl HealthCheck for SearchBackendClient {
    async fn health(&self, metadata: &RequestMetadata) -> Result<HealthResponse, RpcError> {
        self.endpoint.health(metadata).await
    }
}

#[async_trait]
impl SearchBackend for SearchBackendClient {
    async fn search(
        &self,
        query: &SearchQuery,
        metadata: &RequestMetadata,
    ) -> Result<SearchResult, RpcError> {
        self.endpoint.post(SEARCH_PATH, query, metadata).await
    }
}

#[async_trait]
impl<T> SearchBackend for ResilientClient<T>
where
    T: SearchBackend + 'static,
{
    async fn search(
        &self,
        query: &SearchQuery,
        metadata: &RequestMetadata,
    ) -> Result<SearchResult, RpcError> {
        self.call_with_reconnect(|client| {
            let query = query.clone();
            let metadata = metadata.clone();
            async move { client.search(&query, &metadata).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::consts::{HEALTH_PATH, SESSION_ID_HEADER, TRACE_TOKEN_HEADER};
    use common::lexicon::Language;
    use common::traces::TraceContext;
    use mockito::{Matcher, Server};
    use pretty_assertions::assert_eq;

    fn query() -> SearchQuery {
        SearchQuery {
            word: "λόγος".to_string(),
            language: Language::Greek,
            number_of_results: 5,
        }
    }

    #[tokio::test]
    async fn test_search_forwards_metadata() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", SEARCH_PATH)
            .match_header(TRACE_TOKEN_HEADER, "trace+span+1")
            .match_header(SESSION_ID_HEADER, "s1")
            .match_body(Matcher::PartialJsonString(
                r#"{"word": "λόγος", "numberOfResults": 5}"#.to_string(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"results": [{"headword": "λόγος"}], "pageInfo": {"page": 0, "size": 5, "total": 1}}"#)
            .create_async()
            .await;

        let client = SearchBackendClient::dial(&server.url(), Duration::from_secs(5)).unwrap();
        let metadata = RequestMetadata::new(TraceContext::decode("trace+span+1"), "s1");

        let result = client.search(&query(), &metadata).await.unwrap();

        let results = result.results.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].headword, "λόγος");
    }

    #[tokio::test]
    async fn test_unavailable_backend_is_connection_class() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", SEARCH_PATH)
            .with_status(503)
            .with_body("draining")
            .create_async()
            .await;

        let client = SearchBackendClient::dial(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client
            .search(&query(), &RequestMetadata::default())
            .await
            .unwrap_err();

        assert!(err.is_connection_class());
    }

    #[tokio::test]
    async fn test_malformed_body_is_application_class() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", HEALTH_PATH)
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let client = SearchBackendClient::dial(&server.url(), Duration::from_secs(5)).unwrap();
        let err = client.health(&RequestMetadata::default()).await.unwrap_err();

        assert!(matches!(err, RpcError::Decode(_)));
        assert!(!err.is_connection_class());
    }

    #[tokio::test]
    async fn test_resilient_search_retries_after_unavailable() {
        let mut server = Server::new_async().await;
        let unavailable = server
            .mock("POST", SEARCH_PATH)
            .with_status(503)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("POST", SEARCH_PATH)
            .with_status(200)
            .with_body(r#"{"results": []}"#)
            .expect(1)
            .create_async()
            .await;

        let client = ResilientClient::connect(
            server.url(),
            SearchBackendClient::dialer(Duration::from_secs(5)),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = client.search(&query(), &RequestMetadata::default()).await.unwrap();

        assert_eq!(result.results, Some(vec![]));
        assert_eq!(client.reconnect_count(), 1);
        unavailable.assert_async().await;
        ok.assert_async().await;
    }
}
