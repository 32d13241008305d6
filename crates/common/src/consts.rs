/// Packed `{trace_id}+{span_id}+{0|1}` token forwarded on every hop
pub const TRACE_TOKEN_HEADER: &str = "x-trace-token";
/// Opaque session id, key into the counter store's session dimension
pub const SESSION_ID_HEADER: &str = "x-session-id";

pub const HEALTH_PATH: &str = "/v1/health";
pub const SEARCH_PATH: &str = "/v1/search";
pub const SPANS_PATH: &str = "/v1/spans";

pub const COUNTER_ENTRIES_PATH: &str = "/v1/entries";
pub const COUNTER_TOP_FIVE_PATH: &str = "/v1/top-five";
pub const COUNTER_TOP_FIVE_SESSION_PREFIX: &str = "/v1/top-five/session/";
pub const COUNTER_TOP_FIVE_SERVICE_PREFIX: &str = "/v1/top-five/service/";

pub const GATEWAY_SEARCH_PREFIX: &str = "/alexandros/v1/search/";
pub const GATEWAY_HEALTH_PATH: &str = "/alexandros/v1/health";
pub const GATEWAY_PING_PATH: &str = "/alexandros/v1/ping";
pub const GATEWAY_COUNTER_PREFIX: &str = "/alexandros/v1/counter";
pub const LIVENESS_PATH: &str = "/healthz";

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
pub const JSON_CONTENT_TYPE: &str = "application/json";

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HEALTH_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_HEALTH_POLL_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_STREAM_BUFFER: usize = 1024;
