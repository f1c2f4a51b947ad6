use std::path::PathBuf;

pub fn default_version() -> u32 {
    1
}

pub fn default_short_query_words() -> usize {
    4
}

pub fn default_hedge_words() -> Vec<String> {
    [
        "why", "how", "weird", "strange", "intermittent", "sometimes", "unstable", "random",
        "unclear", "occasionally",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

pub fn default_true() -> bool {
    true
}

pub fn default_expansions() -> usize {
    2
}

pub fn default_max_queries() -> usize {
    6
}

pub fn default_hyde_max_chars() -> usize {
    400
}

pub fn default_strategies() -> Vec<crate::config::StrategyKind> {
    vec![
        crate::config::StrategyKind::Semantic,
        crate::config::StrategyKind::Lexical,
    ]
}

pub fn default_top_k() -> usize {
    8
}

pub fn default_rrf_k() -> f64 {
    60.0
}

pub fn default_strategy_weight() -> f64 {
    1.0
}

pub fn default_max_results() -> usize {
    8
}

pub fn default_retrieve_concurrency() -> usize {
    4
}

pub fn default_max_context_chars() -> usize {
    6000
}

pub fn default_boundary() -> String {
    "--- document boundary ---".to_string()
}

pub fn default_min_docs() -> usize {
    2
}

pub fn default_min_answer_chars() -> usize {
    40
}

pub fn default_hyde_cache() -> crate::config::CacheSettings {
    crate::config::CacheSettings {
        capacity: default_hyde_cache_capacity(),
        ttl_secs: default_hyde_cache_ttl_secs(),
    }
}

pub fn default_embedding_cache() -> crate::config::CacheSettings {
    crate::config::CacheSettings {
        capacity: default_embedding_cache_capacity(),
        ttl_secs: default_embedding_cache_ttl_secs(),
    }
}

pub fn default_hyde_cache_capacity() -> usize {
    50
}

pub fn default_hyde_cache_ttl_secs() -> u64 {
    1800
}

pub fn default_embedding_cache_capacity() -> usize {
    100
}

pub fn default_embedding_cache_ttl_secs() -> u64 {
    3600
}

pub fn default_max_attempts() -> u32 {
    3
}

pub fn default_base_delay_ms() -> u64 {
    200
}

pub fn default_max_delay_ms() -> u64 {
    5000
}

pub fn default_generation_timeout_secs() -> u64 {
    60
}

pub fn default_embedding_timeout_secs() -> u64 {
    30
}

pub fn default_search_timeout_secs() -> u64 {
    30
}

pub fn default_generator_binary() -> PathBuf {
    PathBuf::from("ollama")
}

pub fn default_generator_args() -> Vec<String> {
    vec!["run".to_string(), "llama3".to_string()]
}
