use std::sync::Arc;
use std::time::Duration;

use common::lexicon::{AggregatedHealth, HealthStatus};
use common::timestamps::now_rfc3339;
use common::traces::RequestMetadata;
use futures::future::join_all;
use tracing::warn;

use crate::clients::HealthCheck;

/// Calls every registered backend's health RPC concurrently and merges the
/// answers. One failing backend marks only its own entry unhealthy; the
/// aggregate is healthy only when every entry is.
#[derive(Clone)]
pub struct HealthAggregator {
    backends: Vec<(String, Arc<dyn HealthCheck>)>,
    per_call_timeout: Duration,
    version: String,
}

impl HealthAggregator {
    pub fn new(version: impl Into<String>, per_call_timeout: Duration) -> Self {
        Self {
            backends: Vec::new(),
            per_call_timeout,
            version: version.into(),
        }
    }

    pub fn with_backend(mut self, name: impl Into<String>, backend: Arc<dyn HealthCheck>) -> Self {
        self.backends.push((name.into(), backend));
        self
    }

    pub async fn aggregate(&self, metadata: &RequestMetadata) -> AggregatedHealth {
        let checks = self.backends.iter().map(|(name, backend)| {
            // each hop gets its own span under the caller's trace
            let child = metadata.child();
            async move {
                match tokio::time::timeout(self.per_call_timeout, backend.health(&child)).await {
                    Ok(Ok(response)) => HealthStatus::from_response(name.as_str(), response),
                    Ok(Err(err)) => {
                        warn!(service = %name, error = %err, "health check failed");
                        HealthStatus::unreachable(name.as_str())
                    }
                    Err(_) => {
                        warn!(
                            service = %name,
                            timeout_ms = self.per_call_timeout.as_millis() as u64,
                            "health check timed out"
                        );
                        HealthStatus::unreachable(name.as_str())
                    }
                }
            }
        });

        let services = join_all(checks).await;
        let healthy = services.iter().all(|status| status.healthy);

        AggregatedHealth {
            healthy,
            time: now_rfc3339(),
            version: self.version.clone(),
            services,
        }
    }
}
