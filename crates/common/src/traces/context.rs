use std::fmt;

use http::{HeaderMap, HeaderValue};
use rand::RngCore;

use crate::consts::{SESSION_ID_HEADER, TRACE_TOKEN_HEADER};

const SEPARATOR: char = '+';

/// Trace context carried through every hop as a single packed token:
/// `"{trace_id}+{span_id}+{0|1}"`.
///
/// The `sample` flag is sticky. A child context never changes it, so an
/// unsampled request stays unsampled at every depth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceContext {
    pub trace_id: String,
    pub span_id: String,
    pub sample: bool,
}

impl TraceContext {
    /// Decode a packed token. Never fails: absent segments default to an
    /// empty string, and anything but `"1"` in the third segment means
    /// "do not sample".
    pub fn decode(token: &str) -> Self {
        let mut segments = token.split(SEPARATOR);
        let trace_id = segments.next().unwrap_or_default().to_string();
        let span_id = segments.next().unwrap_or_default().to_string();
        let sample = segments.next() == Some("1");

        Self {
            trace_id,
            span_id,
            sample,
        }
    }

    pub fn encode(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.trace_id,
            self.span_id,
            if self.sample { "1" } else { "0" }
        )
    }

    /// Context for the next hop down: same trace id and sample flag, fresh
    /// span id. The new span id is returned alongside for span emission.
    pub fn derive_child(&self) -> (TraceContext, String) {
        let span_id = generate_span_id();
        let child = TraceContext {
            trace_id: self.trace_id.clone(),
            span_id: span_id.clone(),
            sample: self.sample,
        };
        (child, span_id)
    }
}

impl fmt::Display for TraceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Generate a span id: 128 random bits, hex encoded.
pub fn generate_span_id() -> String {
    random_hex::<16>()
}

fn random_hex<const N: usize>() -> String {
    let mut random_bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut random_bytes);
    hex::encode(random_bytes)
}

/// Per-request metadata forwarded across process boundaries: the trace
/// token plus the opaque session id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestMetadata {
    pub trace: TraceContext,
    pub session_id: String,
}

impl RequestMetadata {
    pub fn new(trace: TraceContext, session_id: impl Into<String>) -> Self {
        Self {
            trace,
            session_id: session_id.into(),
        }
    }

    /// Read metadata from inbound headers. A missing trace header is valid
    /// and yields the default (unsampled, empty) context.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let trace = headers
            .get(TRACE_TOKEN_HEADER)
            .and_then(|h| h.to_str().ok())
            .map(TraceContext::decode)
            .unwrap_or_default();
        let session_id = headers
            .get(SESSION_ID_HEADER)
            .and_then(|h| h.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Self { trace, session_id }
    }

    /// Metadata for one hop deeper, sharing the session id.
    pub fn child(&self) -> Self {
        let (trace, _) = self.trace.derive_child();
        Self {
            trace,
            session_id: self.session_id.clone(),
        }
    }

    /// Headers to attach to an outbound call. Values that cannot be
    /// represented as header values are skipped.
    pub fn to_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.trace.encode()) {
            headers.insert(TRACE_TOKEN_HEADER, value);
        }
        if !self.session_id.is_empty() {
            if let Ok(value) = HeaderValue::from_str(&self.session_id) {
                headers.insert(SESSION_ID_HEADER, value);
            }
        }
        headers
    }
}
