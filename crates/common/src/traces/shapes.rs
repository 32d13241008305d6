use serde::{Deserialize, Serialize};

/// One structured event sent to the tracing collector.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TraceEvent {
    #[serde(rename = "traceId")]
    pub trace_id: String,
    #[serde(rename = "parentSpanId")]
    pub parent_span_id: String,
    #[serde(rename = "spanId")]
    pub span_id: String,
    #[serde(rename = "timeUnixNano")]
    pub time_unix_nano: String,
    #[serde(flatten)]
    pub payload: SpanPayload,
}

impl TraceEvent {
    pub fn kind(&self) -> SpanKind {
        self.payload.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanKind {
    RequestStart,
    RequestStop,
    DatabaseQuery,
    CacheHit,
    ServiceToService,
}

/// Kind-specific body of a trace event, serialized as
/// `{"kind": "...", "payload": {...}}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum SpanPayload {
    RequestStart {
        method: String,
        url: String,
        host: String,
        operation: String,
    },
    RequestStop {
        #[serde(rename = "responseCode")]
        response_code: u16,
        #[serde(rename = "tookMs")]
        took_ms: u64,
    },
    DatabaseQuery {
        action: String,
        query: String,
        hits: i64,
        #[serde(rename = "tookMs")]
        took_ms: i64,
    },
    CacheHit {
        action: String,
        status: String,
    },
    ServiceToService {
        service: String,
        method: String,
        #[serde(rename = "tookMs")]
        took_ms: u64,
    },
}

impl SpanPayload {
    pub fn kind(&self) -> SpanKind {
        match self {
            SpanPayload::RequestStart { .. } => SpanKind::RequestStart,
            SpanPayload::RequestStop { .. } => SpanKind::RequestStop,
            SpanPayload::DatabaseQuery { .. } => SpanKind::DatabaseQuery,
            SpanPayload::CacheHit { .. } => SpanKind::CacheHit,
            SpanPayload::ServiceToService { .. } => SpanKind::ServiceToService,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = TraceEvent {
            trace_id: "t".to_string(),
            parent_span_id: "p".to_string(),
            span_id: "s".to_string(),
            time_unix_nano: "42".to_string(),
            payload: SpanPayload::DatabaseQuery {
                action: "search".to_string(),
                query: "{}".to_string(),
                hits: 3,
                took_ms: 12,
            },
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "traceId": "t",
                "parentSpanId": "p",
                "spanId": "s",
                "timeUnixNano": "42",
                "kind": "database_query",
                "payload": {"action": "search", "query": "{}", "hits": 3, "tookMs": 12}
            })
        );
        assert_eq!(event.kind(), SpanKind::DatabaseQuery);
    }
}
