mod cli;
mod corpus;
mod memory;

pub use cli::CliGenerator;
pub use corpus::CorpusSearch;
pub use memory::MemoryCheckpoints;

use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::BTreeMap;

/// One ranked result from a search collaborator.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: String,
    pub content: String,
    pub score: f64,
    pub metadata: BTreeMap<String, String>,
}

/// Text generation collaborator. Used for structured extraction, HyDE,
/// multi-query expansion, consolidated summarization, and the final answer.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, BackendError>;
}

/// Embedding collaborator. Deterministic for identical input, which is what
/// makes the embedding cache sound.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BackendError>;
}

/// Nearest-neighbor search over a prebuilt vector index.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        filter: Option<&str>,
    ) -> Result<Vec<SearchHit>, BackendError>;
}

/// Lexical search collaborator, queried with raw text.
#[async_trait]
pub trait TextSearch: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>, BackendError>;
}

/// Durable snapshot store for long-running threads. The pipeline only
/// writes snapshots at step boundaries; it never reads one mid-run.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, thread_id: &str, step: &str, snapshot: &str)
        -> Result<(), BackendError>;

    /// Latest snapshot for a thread, if any.
    async fn load(&self, thread_id: &str) -> Result<Option<String>, BackendError>;
}
