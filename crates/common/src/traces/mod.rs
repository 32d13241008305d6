// Packed trace token codec and header propagation
mod context;
// Wire shapes of collector events
mod shapes;
// Sampling-aware emission onto a pluggable sink
mod emitter;

pub use context::{generate_span_id, RequestMetadata, TraceContext};
pub use emitter::{NoopSpanSink, RecordingSpanSink, SpanEmitter, SpanSink, StreamSpanSink};
pub use shapes::{SpanKind, SpanPayload, TraceEvent};

#[cfg(test)]
mod tests;
