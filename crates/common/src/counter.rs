//! Wire types of the counter service.

use serde::{Deserialize, Serialize};

/// One search to be counted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountCreationRequest {
    pub word: String,
    pub service_name: String,
    #[serde(default)]
    pub search_type: String,
    #[serde(default)]
    pub session_id: String,
}

/// A batch of count events, one line on the ingest stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountCreationRequestSet {
    pub request: Vec<CountCreationRequest>,
}

impl From<CountCreationRequest> for CountCreationRequestSet {
    fn from(request: CountCreationRequest) -> Self {
        CountCreationRequestSet {
            request: vec![request],
        }
    }
}

/// Answer to a closed ingest stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountStreamResponse {
    pub ack: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopFive {
    pub service_name: String,
    pub word: String,
    /// RFC 3339 timestamp with nanosecond precision.
    pub last_used: String,
    pub count: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopFiveResponse {
    pub top_five: Vec<TopFive>,
}
