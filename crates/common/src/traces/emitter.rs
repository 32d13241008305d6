use std::sync::{Arc, Mutex};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::context::{generate_span_id, TraceContext};
use super::shapes::{SpanKind, SpanPayload, TraceEvent};
use crate::streaming::OutboundStream;

/// Destination for trace events. Implementations must never block and
/// never fail the caller: delivery is best-effort.
pub trait SpanSink: Send + Sync {
    fn send(&self, event: TraceEvent);
}

/// Sends every event on the process-wide span stream to the collector.
pub struct StreamSpanSink {
    stream: OutboundStream<TraceEvent>,
}

impl StreamSpanSink {
    pub fn new(stream: OutboundStream<TraceEvent>) -> Self {
        Self { stream }
    }

    pub fn open(client: reqwest::Client, collector_url: impl Into<String>, buffer: usize) -> Self {
        Self::new(OutboundStream::open(client, collector_url, buffer))
    }
}

impl SpanSink for StreamSpanSink {
    fn send(&self, event: TraceEvent) {
        if let Err(err) = self.stream.send(&event) {
            warn!(
                trace_id = %event.trace_id,
                span_id = %event.span_id,
                error = %err,
                "failed to send trace event"
            );
        }
    }
}

/// Used when no collector is configured or it was unreachable at startup.
pub struct NoopSpanSink;

impl SpanSink for NoopSpanSink {
    fn send(&self, event: TraceEvent) {
        debug!(trace_id = %event.trace_id, "tracing disabled, dropping trace event");
    }
}

/// Keeps every event in memory (for testing/inspection)
#[derive(Default)]
pub struct RecordingSpanSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingSpanSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn count(&self, kind: SpanKind) -> usize {
        self.events().iter().filter(|e| e.kind() == kind).count()
    }
}

impl SpanSink for RecordingSpanSink {
    fn send(&self, event: TraceEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Builds trace events from a request's trace context and hands them to
/// a [`SpanSink`]. Every method is a no-op when the context is unsampled.
///
/// Span id conventions:
/// - `RequestStart` and `ServiceToService` open a new span under the
///   current one.
/// - `RequestStop`, `DatabaseQuery` and `CacheHit` are recorded on the
///   current span itself.
#[derive(Clone)]
pub struct SpanEmitter {
    sink: Arc<dyn SpanSink>,
}

impl SpanEmitter {
    pub fn new(sink: Arc<dyn SpanSink>) -> Self {
        Self { sink }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopSpanSink))
    }

    pub fn emit(&self, ctx: &TraceContext, payload: SpanPayload) {
        if !ctx.sample {
            return;
        }

        let span_id = match payload.kind() {
            SpanKind::RequestStart | SpanKind::ServiceToService => generate_span_id(),
            SpanKind::RequestStop | SpanKind::DatabaseQuery | SpanKind::CacheHit => {
                ctx.span_id.clone()
            }
        };

        self.send(ctx, span_id, payload);
    }

    /// Record a hop whose span id was already handed to the next service
    /// (see [`TraceContext::derive_child`]), so both sides share the span.
    pub fn emit_child(&self, parent: &TraceContext, child_span_id: &str, payload: SpanPayload) {
        if !parent.sample {
            return;
        }
        self.send(parent, child_span_id.to_string(), payload);
    }

    fn send(&self, ctx: &TraceContext, span_id: String, payload: SpanPayload) {
        self.sink.send(TraceEvent {
            trace_id: ctx.trace_id.clone(),
            parent_span_id: ctx.span_id.clone(),
            span_id,
            time_unix_nano: now_unix_nanos().to_string(),
            payload,
        });
    }

    /// Same as [`emit`](Self::emit) but builds the payload lazily, so
    /// unsampled requests never pay for serialization work.
    pub fn emit_with<F>(&self, ctx: &TraceContext, payload: F)
    where
        F: FnOnce() -> SpanPayload,
    {
        if !ctx.sample {
            return;
        }
        self.emit(ctx, payload());
    }

    /// Emit a detached copy of the event on a background task, so the
    /// caller's latency is never affected by the sink.
    pub fn emit_detached(&self, ctx: &TraceContext, payload: SpanPayload) {
        if !ctx.sample {
            return;
        }
        let emitter = self.clone();
        let ctx = ctx.clone();
        tokio::spawn(async move {
            emitter.emit(&ctx, payload);
        });
    }
}

fn now_unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos()
}
