//! Client-streaming transport: one long-lived chunked `POST` whose body is
//! newline-delimited JSON, fed from an in-process channel.
//!
//! The stream is opened once and never reopened. When the remote end goes
//! away every later `send` fails and the item is dropped; callers treat the
//! stream as best-effort.

use std::marker::PhantomData;
use std::time::Duration;

use bytes::Bytes;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use crate::consts::NDJSON_CONTENT_TYPE;

#[derive(Debug, Error)]
pub enum StreamSendError {
    #[error("failed to serialize stream item: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("stream buffer is full")]
    Full,
    #[error("stream is closed")]
    Closed,
}

/// Sender half of an NDJSON client stream. Cheap to share behind an `Arc`;
/// `send` never blocks and is safe to call concurrently.
pub struct OutboundStream<T> {
    tx: mpsc::Sender<Bytes>,
    handle: JoinHandle<()>,
    _item: PhantomData<fn(T)>,
}

impl<T: Serialize> OutboundStream<T> {
    /// Open the stream against `url`. The request is driven by a background
    /// task; the returned handle is usable immediately.
    pub fn open(client: reqwest::Client, url: impl Into<String>, buffer: usize) -> Self {
        let url = url.into();
        let (tx, rx) = mpsc::channel::<Bytes>(buffer.max(1));

        let handle = tokio::spawn(async move {
            let body_stream = ReceiverStream::new(rx).map(Ok::<_, std::io::Error>);
            debug!(url = %url, "opening outbound stream");

            let result = client
                .post(&url)
                .header(reqwest::header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
                .body(reqwest::Body::wrap_stream(body_stream))
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    let ack = response.text().await.unwrap_or_default();
                    debug!(url = %url, ack = %ack, "outbound stream closed by remote");
                }
                Ok(response) => {
                    warn!(url = %url, status = %response.status(), "outbound stream rejected");
                }
                Err(err) => {
                    warn!(url = %url, error = %err, "outbound stream failed");
                }
            }
        });

        Self {
            tx,
            handle,
            _item: PhantomData,
        }
    }

    /// Serialize `item` as one line and queue it on the stream.
    pub fn send(&self, item: &T) -> Result<(), StreamSendError> {
        let mut line = serde_json::to_vec(item)?;
        line.push(b'\n');

        self.tx
            .try_send(Bytes::from(line))
            .map_err(|err| match err {
                TrySendError::Full(_) => StreamSendError::Full,
                TrySendError::Closed(_) => StreamSendError::Closed,
            })
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// End the body and wait up to `timeout` for the remote ack.
    pub async fn close(self, timeout: Duration) {
        let OutboundStream { tx, handle, .. } = self;
        drop(tx);
        if tokio::time::timeout(timeout, handle).await.is_err() {
            warn!("timed out waiting for outbound stream to close");
        }
    }
}
