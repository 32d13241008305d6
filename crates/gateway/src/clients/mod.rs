pub mod counter;
pub mod http;
pub mod resilient;
pub mod search;

pub use counter::{
    CounterClient, CounterQueries, NoopUsageRecorder, RecordingUsageRecorder, StreamUsageRecorder,
    UsageRecorder,
};
pub use resilient::{DialFn, HealthCheck, ResilientClient};
pub use search::{SearchBackend, SearchBackendClient};
