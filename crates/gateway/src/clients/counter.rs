use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::consts::{
    COUNTER_ENTRIES_PATH, COUNTER_TOP_FIVE_PATH, COUNTER_TOP_FIVE_SERVICE_PREFIX,
    COUNTER_TOP_FIVE_SESSION_PREFIX,
};
use common::counter::{CountCreationRequest, CountCreationRequestSet, TopFiveResponse};
use common::errors::RpcError;
use common::lexicon::HealthResponse;
use common::streaming::OutboundStream;
use common::traces::RequestMetadata;
use tracing::{debug, error};

use super::http::JsonEndpoint;
use super::resilient::{DialFn, HealthCheck, ResilientClient};

/// Read side of the counter service.
#[async_trait]
pub trait CounterQueries: Send + Sync {
    async fn top_five(&self, metadata: &RequestMetadata) -> Result<TopFiveResponse, RpcError>;

    async fn top_five_for_session(
        &self,
        session_id: &str,
        metadata: &RequestMetadata,
    ) -> Result<TopFiveResponse, RpcError>;

    async fn top_five_for_service(
        &self,
        service_name: &str,
        metadata: &RequestMetadata,
    ) -> Result<TopFiveResponse, RpcError>;
}

pub struct CounterClient {
    endpoint: JsonEndpoint,
}

impl CounterClient {
    pub fn dial(address: &str, timeout: Duration) -> Result<Self, RpcError> {
        Ok(Self {
            endpoint: JsonEndpoint::dial(address, timeout)?,
        })
    }

    pub fn dialer(timeout: Duration) -> DialFn<Self> {
        Arc::new(move |address| Self::dial(address, timeout))
    }

    /// Open the long-lived ingest stream on this connection's pool.
    pub fn open_publisher(&self, buffer: usize) -> StreamUsageRecorder {
        StreamUsageRecorder::new(OutboundStream::open(
            self.endpoint.http_client(),
            self.endpoint.url(COUNTER_ENTRIES_PATH),
            buffer,
        ))
    }
}

#[async_trait]
impl HealthCheck for CounterClient {
    async fn health(&self, metadata: &RequestMetadata) -> Result<HealthResponse, RpcError> {
        self.endpoint.health(metadata).await
    }
}

#[async_trait]
impl CounterQueries for CounterClient {
    async fn top_five(&self, metadata: &RequestMetadata) -> Result<TopFiveResponse, RpcError> {
        self.endpoint.get(COUNTER_TOP_FIVE_PATH, metadata).await
    }

    async fn top_five_for_session(
        &self,
        session_id: &str,
        metadata: &RequestMetadata,
    ) -> Result<TopFiveResponse, RpcError> {
        let url = self
            .endpoint
            .url_with_segment(COUNTER_TOP_FIVE_SESSION_PREFIX, session_id);
        self.endpoint.get_url(url, metadata).await
    }

    async fn top_five_for_service(
        &self,
        service_name: &str,
        metadata: &RequestMetadata,
    ) -> Result<TopFiveResponse, RpcError> {
        let url = self
            .endpoint
            .url_with_segment(COUNTER_TOP_FIVE_SERVICE_PREFIX, service_name);
        self.endpoint.get_url(url, metadata).await
    }
}

#[async_trait]
impl<T> CounterQueries for ResilientClient<T>
where
    T: CounterQueries + 'static,
{
    async fn top_five(&self, metadata: &RequestMetadata) -> Result<TopFiveResponse, RpcError> {
        self.call_with_reconnect(|client| {
            let metadata = metadata.clone();
            async move { client.top_five(&metadata).await }
        })
        .await
    }

    async fn top_five_for_session(
        &self,
        session_id: &str,
        metadata: &RequestMetadata,
    ) -> Result<TopFiveResponse, RpcError> {
        self.call_with_reconnect(|client| {
            let session_id = session_id.to_string();
            let metadata = metadata.clone();
            async move { client.top_five_for_session(&session_id, &metadata).await }
        })
        .await
    }

    async fn top_five_for_service(
        &self,
        service_name: &str,
        metadata: &RequestMetadata,
    ) -> Result<TopFiveResponse, RpcError> {
        self.call_with_reconnect(|client| {
            let service_name = service_name.to_string();
            let metadata = metadata.clone();
            async move { client.top_five_for_service(&service_name, &metadata).await }
        })
        .await
    }
}

/// Write side of the counter service: best-effort usage events.
pub trait UsageRecorder: Send + Sync {
    fn record(&self, event: CountCreationRequest);
}

/// Pushes every event as its own batch on the shared ingest stream.
pub struct StreamUsageRecorder {
    stream: OutboundStream<CountCreationRequestSet>,
}

impl StreamUsageRecorder {
    pub fn new(stream: OutboundStream<CountCreationRequestSet>) -> Self {
        Self { stream }
    }
}

impl UsageRecorder for StreamUsageRecorder {
    fn record(&self, event: CountCreationRequest) {
        let word = event.word.clone();
        if let Err(err) = self.stream.send(&CountCreationRequestSet::from(event)) {
            error!(word = %word, error = %err, "failed to push usage event to counter");
        }
    }
}

/// Used when the counter service is not configured or was unreachable at
/// startup.
pub struct NoopUsageRecorder;

impl UsageRecorder for NoopUsageRecorder {
    fn record(&self, event: CountCreationRequest) {
        debug!(word = %event.word, "counter disabled, dropping usage event");
    }
}

#[derive(Default)]
pub struct RecordingUsageRecorder {
    events: Mutex<Vec<CountCreationRequest>>,
}

impl RecordingUsageRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CountCreationRequest> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl UsageRecorder for RecordingUsageRecorder {
    fn record(&self, event: CountCreationRequest) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::consts::SESSION_ID_HEADER;
    use common::traces::TraceContext;
    use mockito::Server;
    use pretty_assertions::assert_eq;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_top_five_for_session_path_and_headers() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v1/top-five/session/s%201")
            .match_header(SESSION_ID_HEADER, "s 1")
            .with_status(200)
            .with_body(
                r#"{"topFive": [{"serviceName": "exact", "word": "λόγος", "lastUsed": "2024-01-01T00:00:00Z", "count": 3}]}"#,
            )
            .create_async()
            .await;

        let client = CounterClient::dial(&server.url(), Duration::from_secs(5)).unwrap();
        let metadata = RequestMetadata::new(TraceContext::default(), "s 1");

        let response = client.top_five_for_session("s 1", &metadata).await.unwrap();

        assert_eq!(response.top_five.len(), 1);
        assert_eq!(response.top_five[0].word, "λόγος");
        assert_eq!(response.top_five[0].count, 3);
    }

    #[tokio::test]
    async fn test_top_five_for_service() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/v1/top-five/service/fuzzy")
            .with_status(200)
            .with_body(r#"{"topFive": []}"#)
            .create_async()
            .await;

        let client = CounterClient::dial(&server.url(), Duration::from_secs(5)).unwrap();
        let response = client
            .top_five_for_service("fuzzy", &RequestMetadata::default())
            .await
            .unwrap();

        assert!(response.top_five.is_empty());
    }

    #[tokio::test]
    async fn test_publisher_streams_usage_events() {
        let mut server = Server::new_async().await;
        let ingest = server
            .mock("POST", COUNTER_ENTRIES_PATH)
            .with_status(200)
            .with_body(r#"{"ack": "Received"}"#)
            .create_async()
            .await;

        let client = CounterClient::dial(&server.url(), Duration::from_secs(5)).unwrap();
        let recorder = client.open_publisher(8);

        recorder.record(CountCreationRequest {
            word: "νόμος".to_string(),
            service_name: "fuzzy".to_string(),
            search_type: "fuzzy".to_string(),
            session_id: "s1".to_string(),
        });
        recorder.stream.close(Duration::from_secs(5)).await;

        ingest.assert_async().await;
    }

    /// Accepts one connection and reads the request body forever without
    /// ever answering, like a counter in the middle of an ingest stream.
    async fn endless_ingest() -> (String, Arc<Mutex<Vec<u8>>>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            loop {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => sink.lock().unwrap().extend_from_slice(&buf[..n]),
                }
            }
        });
        (format!("http://{addr}"), received)
    }

    #[tokio::test]
    async fn test_publisher_outlives_request_timeout() {
        let (address, received) = endless_ingest().await;
        let client = CounterClient::dial(&address, Duration::from_millis(200)).unwrap();
        let recorder = client.open_publisher(8);

        recorder.record(CountCreationRequest {
            word: "λόγος".to_string(),
            service_name: "exact".to_string(),
            search_type: "exact".to_string(),
            session_id: "s1".to_string(),
        });
        tokio::time::sleep(Duration::from_millis(700)).await;

        assert!(!recorder.stream.is_closed());
        recorder.record(CountCreationRequest {
            word: "νόμος".to_string(),
            service_name: "fuzzy".to_string(),
            search_type: "fuzzy".to_string(),
            session_id: "s1".to_string(),
        });

        let mut seen = String::new();
        for _ in 0..50 {
            seen = String::from_utf8_lossy(&received.lock().unwrap()).into_owned();
            if seen.contains("νόμος") {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(seen.contains("λόγος"));
        assert!(seen.contains("νόμος"));
    }

    #[test]
    fn test_recording_recorder_keeps_events() {
        let recorder = RecordingUsageRecorder::new();
        recorder.record(CountCreationRequest {
            word: "λόγος".to_string(),
            service_name: "exact".to_string(),
            ..Default::default()
        });
        assert_eq!(recorder.events().len(), 1);
    }
}
