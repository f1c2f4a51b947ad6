use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Hard bounds on user-facing text fields. Inputs beyond these are rejected
/// or truncated at the boundary, never mid-pipeline.
pub const MAX_QUERY_CHARS: usize = 1000;
pub const MAX_CONTEXT_CHARS: usize = 10_000;
pub const MAX_ANSWER_CHARS: usize = 5000;
pub const MAX_RAW_TEXTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Raw query only, no expansion work.
    Fast,
    /// HyDE and multi-query expansion precede retrieval.
    Deep,
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Fast => write!(f, "fast"),
            Route::Deep => write!(f, "deep"),
        }
    }
}

/// A retrieved knowledge document. Immutable once it enters the state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: String,

    pub content: String,

    /// Strategy-relative score. Not comparable across strategies; fusion
    /// replaces it with the fused RRF score.
    pub score: f64,

    /// 1-based rank within the originating run (best rank after fusion).
    pub source_rank: usize,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Warning {
    /// Retrieval produced nothing; the answer is ungrounded.
    NoDocuments,
    /// Fewer documents than the configured minimum.
    LowDocs,
    /// Answer shorter than the configured minimum.
    ShortAnswer,
    /// HyDE generation failed; retrieval fell back to the raw query.
    HydeFallback,
    /// Multi-query expansion failed; retrieval used fewer query variants.
    ExpansionFallback,
    /// The semantic strategy failed; results come from surviving runs only.
    SemanticFailed,
    /// The lexical strategy failed; results come from surviving runs only.
    LexicalFailed,
    /// Consolidated summarization failed; raw context was used instead.
    SummaryFallback,
    /// The generated answer shows no citation marks.
    CitationMissing,
}

impl Warning {
    pub fn as_str(&self) -> &'static str {
        match self {
            Warning::NoDocuments => "no_documents",
            Warning::LowDocs => "low_docs",
            Warning::ShortAnswer => "short_answer",
            Warning::HydeFallback => "hyde_fallback",
            Warning::ExpansionFallback => "expansion_fallback",
            Warning::SemanticFailed => "semantic_failed",
            Warning::LexicalFailed => "lexical_failed",
            Warning::SummaryFallback => "summary_fallback",
            Warning::CitationMissing => "citation_missing",
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-fatal error taxonomy. Each tag maps to a fixed, user-safe
/// fallback message; internal detail stays in metrics and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorTag {
    ExtractError,
    PlanError,
    RetrieveError,
    SynthesizeError,
}

impl ErrorTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorTag::ExtractError => "extract_error",
            ErrorTag::PlanError => "plan_error",
            ErrorTag::RetrieveError => "retrieve_error",
            ErrorTag::SynthesizeError => "synthesize_error",
        }
    }

    /// Fixed fallback answer shown to the caller. Never includes internal
    /// error detail.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            ErrorTag::ExtractError => {
                "We could not interpret the submitted monitoring data. \
                 Please check the input and try again."
            }
            ErrorTag::PlanError => {
                "We could not prepare your query for analysis. \
                 Please rephrase and try again."
            }
            ErrorTag::RetrieveError => {
                "Historical knowledge is temporarily unreachable. \
                 Please retry in a few minutes."
            }
            ErrorTag::SynthesizeError => {
                "Report generation is temporarily unavailable. \
                 Please retry in a few minutes."
            }
        }
    }
}

impl std::fmt::Display for ErrorTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepError {
    pub tag: ErrorTag,
    pub detail: String,
}

/// The single mutable aggregate threaded through the pipeline. One instance
/// per request; never shared across requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestState {
    pub request_id: Uuid,

    pub created_at: DateTime<Utc>,

    pub query: String,

    /// Raw log/alert texts accompanying the query, for the optional
    /// extraction pre-step.
    #[serde(default)]
    pub raw_texts: Vec<String>,

    /// Structured facts extracted from `raw_texts`.
    #[serde(default)]
    pub extracted: Vec<BTreeMap<String, String>>,

    pub route: Route,

    /// Query variants actually used for retrieval, insertion order
    /// significant; the raw query is always first.
    pub queries: Vec<String>,

    /// Fused candidate documents, deduplicated by id.
    pub documents: Vec<Document>,

    pub context: String,

    pub answer: String,

    pub warnings: BTreeSet<Warning>,

    pub error: Option<StepError>,

    pub metrics: BTreeMap<String, serde_json::Value>,
}

impl RequestState {
    /// Build a fresh state from a raw query. Rejects empty queries and
    /// enforces the query length bound.
    pub fn new(query: &str) -> Result<Self, StateError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(StateError::EmptyQuery);
        }
        if trimmed.chars().count() > MAX_QUERY_CHARS {
            return Err(StateError::QueryTooLong {
                max: MAX_QUERY_CHARS,
            });
        }

        Ok(Self {
            request_id: Uuid::new_v4(),
            created_at: Utc::now(),
            query: trimmed.to_string(),
            raw_texts: Vec::new(),
            extracted: Vec::new(),
            route: Route::Fast,
            queries: Vec::new(),
            documents: Vec::new(),
            context: String::new(),
            answer: String::new(),
            warnings: BTreeSet::new(),
            error: None,
            metrics: BTreeMap::new(),
        })
    }

    /// Attach raw monitoring texts, dropping blanks and capping the count.
    pub fn with_raw_texts(mut self, texts: Vec<String>) -> Self {
        self.raw_texts = texts
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(MAX_RAW_TEXTS)
            .collect();
        self
    }

    pub fn warn(&mut self, warning: Warning) {
        self.warnings.insert(warning);
    }

    pub fn set_metric(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metrics.insert(key.to_string(), value.into());
    }

    pub fn fail(&mut self, tag: ErrorTag, detail: impl Into<String>) {
        self.error = Some(StepError {
            tag,
            detail: detail.into(),
        });
    }

    /// Serialize a snapshot for an external checkpoint store.
    pub fn snapshot(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Restore a state previously produced by [`RequestState::snapshot`].
    pub fn restore(snapshot: &str) -> serde_json::Result<Self> {
        serde_json::from_str(snapshot)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("Query cannot be empty or whitespace only")]
    EmptyQuery,

    #[error("Query exceeds {max} characters")]
    QueryTooLong { max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_trims_and_keeps_query() {
        let state = RequestState::new("  apache 502 errors spiking  ").unwrap();
        assert_eq!(state.query, "apache 502 errors spiking");
        assert_eq!(state.route, Route::Fast);
        assert!(state.error.is_none());
    }

    #[test]
    fn new_rejects_blank_query() {
        assert!(matches!(
            RequestState::new("   "),
            Err(StateError::EmptyQuery)
        ));
    }

    #[test]
    fn new_rejects_oversized_query() {
        let long = "x".repeat(MAX_QUERY_CHARS + 1);
        assert!(matches!(
            RequestState::new(&long),
            Err(StateError::QueryTooLong { .. })
        ));
    }

    #[test]
    fn raw_texts_are_cleaned() {
        let state = RequestState::new("q")
            .unwrap()
            .with_raw_texts(vec!["  a  ".into(), "".into(), "b".into()]);
        assert_eq!(state.raw_texts, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn snapshot_round_trips() {
        let mut state = RequestState::new("disk full on db-01").unwrap();
        state.route = Route::Deep;
        state.queries = vec!["disk full on db-01".into(), "database disk usage".into()];
        state.warn(Warning::LowDocs);
        state.set_metric("docs", 1);

        let snapshot = state.snapshot().unwrap();
        let restored = RequestState::restore(&snapshot).unwrap();

        assert_eq!(restored.request_id, state.request_id);
        assert_eq!(restored.queries, state.queries);
        assert_eq!(restored.route, Route::Deep);
        assert!(restored.warnings.contains(&Warning::LowDocs));
    }

    #[test]
    fn fallback_messages_are_distinct() {
        let tags = [
            ErrorTag::ExtractError,
            ErrorTag::PlanError,
            ErrorTag::RetrieveError,
            ErrorTag::SynthesizeError,
        ];
        for a in &tags {
            for b in &tags {
                if a != b {
                    assert_ne!(a.fallback_message(), b.fallback_message());
                }
            }
        }
    }
}
