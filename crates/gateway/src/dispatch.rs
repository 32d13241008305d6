use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use common::errors::ServiceError;
use common::lexicon::{Language, SearchQuery, SearchResponse};
use common::traces::{RequestMetadata, TraceContext};
use thiserror::Error;
use tracing::debug;

use crate::clients::SearchBackend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchKind {
    Exact,
    Fuzzy,
    Partial,
    Phrase,
    Extended,
}

#[derive(Debug, Error)]
#[error("unknown search kind `{0}`")]
pub struct UnknownSearchKind(pub String);

impl SearchKind {
    pub const ALL: [SearchKind; 5] = [
        SearchKind::Exact,
        SearchKind::Fuzzy,
        SearchKind::Partial,
        SearchKind::Phrase,
        SearchKind::Extended,
    ];

    /// Name of the backend service answering this kind.
    pub fn service_name(&self) -> &'static str {
        match self {
            SearchKind::Exact => "exact",
            SearchKind::Fuzzy => "fuzzy",
            SearchKind::Partial => "partial",
            SearchKind::Phrase => "phrase",
            SearchKind::Extended => "extended",
        }
    }

    /// Value recorded as `search_type` on usage events.
    pub fn search_type(&self) -> &'static str {
        match self {
            SearchKind::Extended => "textSearch",
            other => other.service_name(),
        }
    }
}

impl fmt::Display for SearchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

impl FromStr for SearchKind {
    type Err = UnknownSearchKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SearchKind::ALL
            .into_iter()
            .find(|kind| kind.service_name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownSearchKind(s.to_string()))
    }
}

/// One search as handed to a backend. `word` is never interpreted here.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchDispatchRequest {
    pub word: String,
    pub language: Language,
    pub requested_result_count: i64,
    pub session_id: String,
    pub trace: TraceContext,
}

impl SearchDispatchRequest {
    pub fn new(query: SearchQuery, metadata: RequestMetadata) -> Self {
        Self {
            word: query.word,
            language: query.language,
            requested_result_count: query.number_of_results,
            session_id: metadata.session_id,
            trace: metadata.trace,
        }
    }

    pub fn query(&self) -> SearchQuery {
        SearchQuery {
            word: self.word.clone(),
            language: self.language,
            number_of_results: self.requested_result_count,
        }
    }

    pub fn metadata(&self) -> RequestMetadata {
        RequestMetadata::new(self.trace.clone(), self.session_id.clone())
    }
}

/// Maps each search kind to the one backend that serves it.
#[derive(Clone, Default)]
pub struct SearchRouter {
    routes: HashMap<SearchKind, Arc<dyn SearchBackend>>,
}

impl SearchRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_route(mut self, kind: SearchKind, backend: Arc<dyn SearchBackend>) -> Self {
        self.routes.insert(kind, backend);
        self
    }

    pub fn route(&self, kind: SearchKind) -> Option<&Arc<dyn SearchBackend>> {
        self.routes.get(&kind)
    }

    /// Send the request to the backend for `kind` and normalize its answer.
    /// Backend errors are returned unchanged; retry already happened in the
    /// resilient client.
    pub async fn dispatch(
        &self,
        kind: SearchKind,
        request: &SearchDispatchRequest,
    ) -> Result<SearchResponse, ServiceError> {
        let backend = self
            .route(kind)
            .ok_or_else(|| ServiceError::NotConfigured(kind.service_name().to_string()))?;

        debug!(kind = %kind, trace_id = %request.trace.trace_id, "dispatching search");
        let result = backend.search(&request.query(), &request.metadata()).await?;

        Ok(SearchResponse::from(result))
    }
}
