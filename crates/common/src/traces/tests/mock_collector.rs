//! Mock tracing collector for testing the span stream
//!
//! A small HTTP server that mimics the collector's ingestion endpoint:
//! - POST /v1/spans: read the NDJSON body frame by frame and capture every
//!   line as it arrives, answer with an ack once the body ends
//!
//! Each test creates its own MockCollector instance.

use axum::{body::Body, extract::State, routing::post, Router};
use futures::StreamExt;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::RwLock;

type SharedEvents = Arc<RwLock<Vec<Value>>>;

/// POST /v1/spans - capture every NDJSON line of the streamed body
async fn post_spans(State(events): State<SharedEvents>, body: Body) -> String {
    let mut stream = body.into_data_stream();
    let mut pending: Vec<u8> = Vec::new();

    while let Some(Ok(chunk)) = stream.next().await {
        pending.extend_from_slice(&chunk);
        while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = pending.drain(..=pos).collect();
            if let Ok(value) = serde_json::from_slice::<Value>(&line[..line.len() - 1]) {
                events.write().await.push(value);
            }
        }
    }

    "Received".to_string()
}

/// Mock collector server
pub struct MockCollector {
    address: String,
    events: SharedEvents,
    #[allow(dead_code)]
    server_handle: tokio::task::JoinHandle<()>,
}

impl MockCollector {
    /// Create and start a new mock collector on a random port
    pub async fn start() -> Self {
        let events = Arc::new(RwLock::new(Vec::new()));

        let app = Router::new()
            .route("/v1/spans", post(post_spans))
            .with_state(events.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let addr = listener.local_addr().expect("Failed to get local address");
        let address = format!("http://127.0.0.1:{}", addr.port());

        let server_handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Server failed");
        });

        Self {
            address,
            events,
            server_handle,
        }
    }

    /// Get the address of the collector
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn spans_url(&self) -> String {
        format!("{}/v1/spans", self.address)
    }

    /// Poll until at least `count` events arrived or `wait_ms` elapsed
    pub async fn wait_for(&self, count: usize, wait_ms: u64) -> Vec<Value> {
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_millis(wait_ms);
        loop {
            let events = self.events.read().await.clone();
            if events.len() >= count || tokio::time::Instant::now() >= deadline {
                return events;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        }
    }
}
