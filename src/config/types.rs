use crate::retry::RetryPolicy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::defaults::*;

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub route: RouteConfig,

    #[serde(default)]
    pub plan: PlanConfig,

    #[serde(default)]
    pub retrieve: RetrieveConfig,

    #[serde(default)]
    pub synthesize: SynthesizeConfig,

    #[serde(default)]
    pub validate: ValidateConfig,

    #[serde(default)]
    pub caches: CachesConfig,

    #[serde(default)]
    pub retry: RetryPolicy,

    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    #[serde(default)]
    pub extraction: ExtractionConfig,

    #[serde(default)]
    pub generator: GeneratorConfig,

    /// JSONL corpus backing the bundled lexical adapter. Optional; without
    /// it the binary needs externally wired search collaborators.
    #[serde(default)]
    pub corpus: Option<PathBuf>,
}

/// FAST/DEEP routing heuristic knobs.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RouteConfig {
    /// Queries with fewer words than this are considered underspecified.
    #[serde(default = "default_short_query_words")]
    pub short_query_words: usize,

    /// Ambiguity markers; any occurrence forces the DEEP route.
    #[serde(default = "default_hedge_words")]
    pub hedge_words: Vec<String>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            short_query_words: default_short_query_words(),
            hedge_words: default_hedge_words(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct PlanConfig {
    #[serde(default = "default_true")]
    pub use_hyde: bool,

    #[serde(default = "default_true")]
    pub use_multi_query: bool,

    /// Alternative phrasings requested from the generator on DEEP.
    #[serde(default = "default_expansions")]
    pub expansions: usize,

    /// Hard cap on the query set, HyDE and expansions included.
    #[serde(default = "default_max_queries")]
    pub max_queries: usize,

    /// Generated hypothetical documents are clipped to this many chars
    /// before being used as retrieval queries.
    #[serde(default = "default_hyde_max_chars")]
    pub hyde_max_chars: usize,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            use_hyde: default_true(),
            use_multi_query: default_true(),
            expansions: default_expansions(),
            max_queries: default_max_queries(),
            hyde_max_chars: default_hyde_max_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    Semantic,
    Lexical,
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StrategyKind::Semantic => write!(f, "semantic"),
            StrategyKind::Lexical => write!(f, "lexical"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct RetrieveConfig {
    /// Which strategies fan out; semantic-only and hybrid are both valid.
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyKind>,

    /// Results requested from each strategy per query variant.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// RRF smoothing constant.
    #[serde(default = "default_rrf_k")]
    pub rrf_k: f64,

    #[serde(default = "default_strategy_weight")]
    pub semantic_weight: f64,

    #[serde(default = "default_strategy_weight")]
    pub lexical_weight: f64,

    /// Fused result count handed to synthesis.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Bounded parallelism across (query, strategy) runs.
    #[serde(default = "default_retrieve_concurrency")]
    pub concurrency: usize,

    /// Optional metadata filter passed to the vector index.
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for RetrieveConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            top_k: default_top_k(),
            rrf_k: default_rrf_k(),
            semantic_weight: default_strategy_weight(),
            lexical_weight: default_strategy_weight(),
            max_results: default_max_results(),
            concurrency: default_retrieve_concurrency(),
            filter: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct SynthesizeConfig {
    /// Character budget for the assembled context. Documents are included
    /// whole or not at all.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,

    /// Separator between documents in the assembled context.
    #[serde(default = "default_boundary")]
    pub boundary: String,
}

impl Default for SynthesizeConfig {
    fn default() -> Self {
        Self {
            max_context_chars: default_max_context_chars(),
            boundary: default_boundary(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct ValidateConfig {
    #[serde(default = "default_min_docs")]
    pub min_docs: usize,

    #[serde(default = "default_min_answer_chars")]
    pub min_answer_chars: usize,
}

impl Default for ValidateConfig {
    fn default() -> Self {
        Self {
            min_docs: default_min_docs(),
            min_answer_chars: default_min_answer_chars(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema)]
pub struct CacheSettings {
    pub capacity: usize,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema)]
pub struct CachesConfig {
    /// Keyed by monitoring-context fingerprint. Inputs churn, so small and
    /// short-lived.
    #[serde(default = "default_hyde_cache")]
    pub hyde: CacheSettings,

    /// Keyed by text content. Embeddings of identical text are stable, so
    /// larger and longer-lived.
    #[serde(default = "default_embedding_cache")]
    pub embedding: CacheSettings,
}

impl Default for CachesConfig {
    fn default() -> Self {
        Self {
            hyde: default_hyde_cache(),
            embedding: default_embedding_cache(),
        }
    }
}

/// Per-call deadlines for external collaborators. An elapsed deadline is a
/// retryable failure.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, JsonSchema)]
pub struct TimeoutsConfig {
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_secs: u64,

    #[serde(default = "default_embedding_timeout_secs")]
    pub embedding_secs: u64,

    #[serde(default = "default_search_timeout_secs")]
    pub search_secs: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            generation_secs: default_generation_timeout_secs(),
            embedding_secs: default_embedding_timeout_secs(),
            search_secs: default_search_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema)]
pub struct ExtractionConfig {
    /// Enables the structured-extraction pre-step for requests carrying raw
    /// log/alert texts.
    #[serde(default)]
    pub enabled: bool,
}

/// Subprocess generator wiring for the bundled CLI adapter.
#[derive(Debug, Clone, Deserialize, Serialize, JsonSchema)]
pub struct GeneratorConfig {
    #[serde(default = "default_generator_binary")]
    pub binary: PathBuf,

    #[serde(default = "default_generator_args")]
    pub args: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            binary: default_generator_binary(),
            args: default_generator_args(),
        }
    }
}
