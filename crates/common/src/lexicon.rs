//! Wire types shared by the gateway and the search backends.
//!
//! Backends answer with [`LemmaResult`], a lenient shape where every field
//! may be missing. The gateway converts it into [`Lemma`] through one
//! conversion so every backend's answer looks identical to the consumer:
//! empty optional strings are dropped, list fields are always present.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Language {
    #[default]
    Greek,
    English,
    Dutch,
}

/// Search RPC request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub word: String,
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub number_of_results: i64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    #[serde(default)]
    pub page: i64,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub total: i64,
}

// -----------------------------------------------------------------------------
// Backend shapes (as received)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LemmaResult {
    pub id: String,
    pub headword: String,
    pub normalized: String,
    pub linked_word: String,
    pub part_of_speech: String,
    pub article: String,
    pub gender: String,
    pub noun: Option<NounResult>,
    pub verb: Option<VerbResult>,
    pub quick_glosses: Option<Vec<LocalizedGloss>>,
    pub definitions: Option<Vec<DefinitionResult>>,
    pub modern_connections: Option<Vec<ModernConnectionResult>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NounResult {
    pub declension: String,
    pub genitive: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerbResult {
    pub principal_parts: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefinitionResult {
    pub grade: i32,
    pub meanings: Option<Vec<MeaningResult>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeaningResult {
    pub language: String,
    pub definition: String,
    pub notes: Option<Vec<String>>,
    pub example: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModernConnectionResult {
    pub term: String,
    pub note: String,
}

/// Search RPC response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchResult {
    pub results: Option<Vec<LemmaResult>>,
    pub page_info: Option<PageInfo>,
}

// -----------------------------------------------------------------------------
// Normalized shapes (as returned by the gateway)
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalizedGloss {
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub gloss: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lemma {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub headword: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub normalized: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linked_word: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub part_of_speech: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub article: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub noun: Option<NounInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verb: Option<VerbInfo>,
    pub quick_glosses: Vec<LocalizedGloss>,
    pub definitions: Vec<Definition>,
    pub modern_connections: Vec<ModernConnection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NounInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub declension: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genitive: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbInfo {
    pub principal_parts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Definition {
    pub grade: i32,
    pub meanings: Vec<Meaning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meaning {
    pub language: String,
    pub definition: String,
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModernConnection {
    pub term: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub results: Vec<Lemma>,
    pub page_info: PageInfo,
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

impl From<LemmaResult> for Lemma {
    fn from(result: LemmaResult) -> Self {
        let definitions = result
            .definitions
            .unwrap_or_default()
            .into_iter()
            .map(|definition| Definition {
                grade: definition.grade,
                meanings: definition
                    .meanings
                    .unwrap_or_default()
                    .into_iter()
                    .map(|meaning| Meaning {
                        language: meaning.language,
                        definition: meaning.definition,
                        notes: meaning.notes.unwrap_or_default(),
                        example: non_empty(meaning.example),
                    })
                    .collect(),
            })
            .collect();

        let modern_connections = result
            .modern_connections
            .unwrap_or_default()
            .into_iter()
            .map(|mc| ModernConnection {
                term: mc.term,
                note: non_empty(mc.note),
            })
            .collect();

        Lemma {
            id: non_empty(result.id),
            headword: result.headword,
            normalized: non_empty(result.normalized),
            linked_word: non_empty(result.linked_word),
            part_of_speech: non_empty(result.part_of_speech),
            article: non_empty(result.article),
            gender: non_empty(result.gender),
            noun: result.noun.map(|noun| NounInfo {
                declension: non_empty(noun.declension),
                genitive: non_empty(noun.genitive),
            }),
            verb: result.verb.map(|verb| VerbInfo {
                principal_parts: verb.principal_parts.unwrap_or_default(),
            }),
            quick_glosses: result.quick_glosses.unwrap_or_default(),
            definitions,
            modern_connections,
        }
    }
}

impl From<SearchResult> for SearchResponse {
    fn from(result: SearchResult) -> Self {
        SearchResponse {
            results: result
                .results
                .unwrap_or_default()
                .into_iter()
                .map(Lemma::from)
                .collect(),
            page_info: result.page_info.unwrap_or_default(),
        }
    }
}

// -----------------------------------------------------------------------------
// Health
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DatabaseHealth {
    pub healthy: bool,
    pub cluster_name: String,
    pub server_name: String,
    pub server_version: String,
}

/// Health RPC response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthResponse {
    pub healthy: bool,
    pub time: String,
    pub database_health: Option<DatabaseHealth>,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseInfo {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_version: Option<String>,
}

impl From<DatabaseHealth> for DatabaseInfo {
    fn from(health: DatabaseHealth) -> Self {
        DatabaseInfo {
            healthy: health.healthy,
            cluster_name: non_empty(health.cluster_name),
            server_name: non_empty(health.server_name),
            server_version: non_empty(health.server_version),
        }
    }
}

/// Health of one backend as seen by the gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub name: String,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_info: Option<DatabaseInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl HealthStatus {
    pub fn unreachable(name: impl Into<String>) -> Self {
        HealthStatus {
            name: name.into(),
            healthy: false,
            database_info: None,
            version: None,
        }
    }

    pub fn from_response(name: impl Into<String>, response: HealthResponse) -> Self {
        HealthStatus {
            name: name.into(),
            healthy: response.healthy,
            database_info: response.database_health.map(DatabaseInfo::from),
            version: non_empty(response.version),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedHealth {
    pub healthy: bool,
    pub time: String,
    pub version: String,
    pub services: Vec<HealthStatus>,
}

/// Lightweight liveness answer, does not touch any dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub healthy: bool,
    pub time: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_sparse_backend_result_normalizes() {
        let result: SearchResult = serde_json::from_value(json!({
            "results": [{
                "headword": "λόγος",
                "partOfSpeech": "noun",
                "noun": {"genitive": "λόγου"},
                "definitions": [{"grade": 1, "meanings": [{"language": "en", "definition": "word"}]}]
            }],
            "pageInfo": {"page": 0, "size": 5, "total": 1}
        }))
        .unwrap();

        let response = SearchResponse::from(result);
        let lemma = &response.results[0];

        assert_eq!(lemma.headword, "λόγος");
        assert_eq!(lemma.id, None);
        assert_eq!(lemma.part_of_speech.as_deref(), Some("noun"));
        assert_eq!(
            lemma.noun,
            Some(NounInfo {
                declension: None,
                genitive: Some("λόγου".to_string())
            })
        );
        assert!(lemma.quick_glosses.is_empty());
        assert!(lemma.modern_connections.is_empty());
        assert_eq!(lemma.definitions[0].meanings[0].notes, Vec::<String>::new());
        assert_eq!(response.page_info.total, 1);
    }

    #[test]
    fn test_normalized_lemma_wire_shape() {
        let lemma = Lemma::from(LemmaResult {
            headword: "νόμος".to_string(),
            verb: Some(VerbResult {
                principal_parts: None,
            }),
            modern_connections: Some(vec![ModernConnectionResult {
                term: "autonomy".to_string(),
                note: String::new(),
            }]),
            ..Default::default()
        });

        assert_eq!(
            serde_json::to_value(&lemma).unwrap(),
            json!({
                "headword": "νόμος",
                "verb": {"principalParts": []},
                "quickGlosses": [],
                "definitions": [],
                "modernConnections": [{"term": "autonomy"}]
            })
        );
    }

    #[test]
    fn test_empty_search_result() {
        let response = SearchResponse::from(serde_json::from_str::<SearchResult>("{}").unwrap());
        assert!(response.results.is_empty());
        assert_eq!(response.page_info, PageInfo::default());
    }

    #[test]
    fn test_language_wire_names() {
        let query: SearchQuery =
            serde_json::from_str(r#"{"word": "house", "language": "ENGLISH"}"#).unwrap();
        assert_eq!(query.language, Language::English);
        assert_eq!(query.number_of_results, 0);
    }

    #[test]
    fn test_health_status_from_response() {
        let status = HealthStatus::from_response(
            "exact",
            HealthResponse {
                healthy: true,
                time: "now".to_string(),
                database_health: Some(DatabaseHealth {
                    healthy: true,
                    cluster_name: "odysseia".to_string(),
                    ..Default::default()
                }),
                version: "v1.2.3".to_string(),
            },
        );

        assert!(status.healthy);
        assert_eq!(status.version.as_deref(), Some("v1.2.3"));
        let db = status.database_info.unwrap();
        assert_eq!(db.cluster_name.as_deref(), Some("odysseia"));
        assert_eq!(db.server_name, None);
    }
}
