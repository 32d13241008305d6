use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::errors::RpcError;
use common::lexicon::HealthResponse;
use common::traces::RequestMetadata;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Builds a fresh backend client for an address.
pub type DialFn<T> = Arc<dyn Fn(&str) -> Result<T, RpcError> + Send + Sync>;

/// Anything that answers the health RPC.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health(&self, metadata: &RequestMetadata) -> Result<HealthResponse, RpcError>;
}

/// Owns the connection to one backend and retries a call once, on a fresh
/// connection, when it fails for transport reasons.
///
/// The handle is only ever replaced wholesale under the lock; calls run on
/// a snapshot taken outside it, so a reconnect never blocks in-flight calls
/// and concurrent callers see either the old or the new handle.
pub struct ResilientClient<T> {
    address: String,
    handle: Mutex<Arc<T>>,
    dial: DialFn<T>,
    call_timeout: Duration,
    reconnects: AtomicU64,
}

impl<T> ResilientClient<T>
where
    T: Send + Sync + 'static,
{
    pub fn connect(
        address: impl Into<String>,
        dial: DialFn<T>,
        call_timeout: Duration,
    ) -> Result<Self, RpcError> {
        let address = address.into();
        let client = dial(&address)?;
        Ok(Self {
            address,
            handle: Mutex::new(Arc::new(client)),
            dial,
            call_timeout,
            reconnects: AtomicU64::new(0),
        })
    }

    /// [`connect`](Self::connect) with up to `attempts` tries spaced by
    /// `delay`. Used at startup when a dependency may still be coming up.
    pub async fn connect_with_retry(
        address: impl Into<String>,
        dial: DialFn<T>,
        call_timeout: Duration,
        attempts: u32,
        delay: Duration,
    ) -> Result<Self, RpcError> {
        let address = address.into();
        let attempts = attempts.max(1);
        let mut attempt = 1;

        loop {
            match Self::connect(address.clone(), dial.clone(), call_timeout) {
                Ok(client) => return Ok(client),
                Err(err) if attempt < attempts => {
                    warn!(
                        address = %address,
                        attempt,
                        attempts,
                        error = %err,
                        "failed to dial, retrying"
                    );
                    attempt += 1;
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub async fn reconnect(&self) -> Result<(), RpcError> {
        let mut handle = self.handle.lock().await;
        self.reconnects.fetch_add(1, Ordering::Relaxed);
        let client = (self.dial)(&self.address)?;
        *handle = Arc::new(client);
        info!(address = %self.address, "reconnected");
        Ok(())
    }

    async fn snapshot(&self) -> Arc<T> {
        self.handle.lock().await.clone()
    }

    /// Run `op` against the current handle. A connection-class failure
    /// triggers one reconnect and exactly one retry, each attempt with its
    /// own deadline. A failed reconnect is returned as-is.
    pub async fn call_with_reconnect<R, F, Fut>(&self, op: F) -> Result<R, RpcError>
    where
        F: Fn(Arc<T>) -> Fut,
        Fut: Future<Output = Result<R, RpcError>>,
    {
        let client = self.snapshot().await;
        match self.attempt(op(client)).await {
            Ok(value) => Ok(value),
            Err(err) if err.is_connection_class() => {
                debug!(
                    address = %self.address,
                    error = %err,
                    "connection error detected, reconnecting"
                );
                self.reconnect().await?;
                let client = self.snapshot().await;
                self.attempt(op(client)).await
            }
            Err(err) => Err(err),
        }
    }

    async fn attempt<R, Fut>(&self, call: Fut) -> Result<R, RpcError>
    where
        Fut: Future<Output = Result<R, RpcError>>,
    {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::DeadlineExceeded(self.call_timeout)),
        }
    }
}

impl<T> ResilientClient<T>
where
    T: HealthCheck + 'static,
{
    /// Poll the health RPC every `poll_interval` until it reports healthy or
    /// `timeout` elapses.
    pub async fn wait_for_healthy_state(&self, timeout: Duration, poll_interval: Duration) -> bool {
        let metadata = RequestMetadata::default();
        let poll = async {
            loop {
                let client = self.snapshot().await;
                match self.attempt(client.health(&metadata)).await {
                    Ok(response) if response.healthy => return,
                    Ok(_) => debug!(address = %self.address, "backend not healthy yet"),
                    Err(err) => {
                        debug!(address = %self.address, error = %err, "health poll failed")
                    }
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, poll).await.is_ok()
    }
}

#[async_trait]
impl<T> HealthCheck for ResilientClient<T>
where
    T: HealthCheck + 'static,
{
    async fn health(&self, metadata: &RequestMetadata) -> Result<HealthResponse, RpcError> {
        self.call_with_reconnect(|client| {
            let metadata = metadata.clone();
            async move { client.health(&metadata).await }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Fails the first `failures` calls (across all handles) with `error`.
    struct FlakyBackend {
        calls: Arc<AtomicUsize>,
        failures: usize,
        error: fn() -> RpcError,
        generation: u64,
    }

    impl FlakyBackend {
        async fn call(&self) -> Result<u64, RpcError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err((self.error)())
            } else {
                Ok(self.generation)
            }
        }
    }

    #[async_trait]
    impl HealthCheck for FlakyBackend {
        async fn health(&self, _: &RequestMetadata) -> Result<HealthResponse, RpcError> {
            self.call().await.map(|_| HealthResponse {
                healthy: true,
                ..Default::default()
            })
        }
    }

    fn unavailable() -> RpcError {
        RpcError::Unavailable {
            address: "exact".to_string(),
            reason: "connection refused".to_string(),
        }
    }

    fn not_found() -> RpcError {
        RpcError::Status {
            status: 404,
            body: "no such word".to_string(),
        }
    }

    fn flaky_client(
        failures: usize,
        error: fn() -> RpcError,
    ) -> (ResilientClient<FlakyBackend>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let generation = Arc::new(AtomicU64::new(0));
        let dial_calls = calls.clone();
        let dial: DialFn<FlakyBackend> = Arc::new(move |_| {
            Ok(FlakyBackend {
                calls: dial_calls.clone(),
                failures,
                error,
                generation: generation.fetch_add(1, Ordering::SeqCst),
            })
        });
        let client =
            ResilientClient::connect("exact:50060", dial, Duration::from_secs(1)).unwrap();
        (client, calls)
    }

    #[tokio::test]
    async fn test_one_transport_failure_reconnects_once() {
        let (client, calls) = flaky_client(1, unavailable);

        let generation = client
            .call_with_reconnect(|backend| async move { backend.call().await })
            .await
            .unwrap();

        assert_eq!(client.reconnect_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // the retry ran on the freshly dialed handle
        assert_eq!(generation, 1);
    }

    #[tokio::test]
    async fn test_repeated_transport_failure_gives_up_after_one_reconnect() {
        let (client, calls) = flaky_client(usize::MAX, unavailable);

        let result = client
            .call_with_reconnect(|backend| async move { backend.call().await })
            .await;

        assert!(matches!(result, Err(RpcError::Unavailable { .. })));
        assert_eq!(client.reconnect_count(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_application_error_is_not_retried() {
        let (client, calls) = flaky_client(1, not_found);

        let result = client
            .call_with_reconnect(|backend| async move { backend.call().await })
            .await;

        assert!(matches!(result, Err(RpcError::Status { status: 404, .. })));
        assert_eq!(client.reconnect_count(), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_deadline_is_connection_class_and_refreshed_on_retry() {
        let (client, _) = flaky_client(0, unavailable);
        let attempts = Arc::new(AtomicUsize::new(0));

        let result = client
            .call_with_reconnect(|_| {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                    Ok::<_, RpcError>("answered")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "answered");
        assert_eq!(client.reconnect_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_reconnect_is_returned() {
        let dialed = Arc::new(AtomicUsize::new(0));
        let counter = dialed.clone();
        let dial: DialFn<FlakyBackend> = Arc::new(move |address| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(FlakyBackend {
                    calls: Arc::new(AtomicUsize::new(0)),
                    failures: usize::MAX,
                    error: unavailable,
                    generation: 0,
                })
            } else {
                Err(RpcError::Dial {
                    address: address.to_string(),
                    reason: "no route to host".to_string(),
                })
            }
        });
        let client = ResilientClient::connect("exact:50060", dial, Duration::from_secs(1)).unwrap();

        let result = client
            .call_with_reconnect(|backend| async move { backend.call().await })
            .await;

        assert!(matches!(result, Err(RpcError::Dial { .. })));
    }

    #[tokio::test]
    async fn test_wait_for_healthy_state_polls_until_healthy() {
        let (client, calls) = flaky_client(2, unavailable);

        let healthy = client
            .wait_for_healthy_state(Duration::from_secs(2), Duration::from_millis(10))
            .await;

        assert!(healthy);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // polling never reconnects
        assert_eq!(client.reconnect_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_healthy_state_times_out() {
        let (client, _) = flaky_client(usize::MAX, unavailable);

        let healthy = client
            .wait_for_healthy_state(Duration::from_millis(50), Duration::from_millis(10))
            .await;

        assert!(!healthy);
    }

    #[tokio::test]
    async fn test_connect_with_retry_gives_up() {
        let dial: DialFn<FlakyBackend> = Arc::new(|address| {
            Err(RpcError::Dial {
                address: address.to_string(),
                reason: "invalid uri".to_string(),
            })
        });

        let result = ResilientClient::connect_with_retry(
            "::bad::",
            dial,
            Duration::from_secs(1),
            3,
            Duration::from_millis(1),
        )
        .await;

        assert!(matches!(result, Err(RpcError::Dial { .. })));
    }
}
