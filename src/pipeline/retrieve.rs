use super::fusion::{fuse, FusionParams, RetrievalRun};
use super::{timed, Pipeline, StepResult};
use crate::cache::content_key;
use crate::config::StrategyKind;
use crate::error::BackendError;
use crate::observe::Event;
use crate::provider::SearchHit;
use crate::retry::with_retry;
use crate::state::{Document, ErrorTag, RequestState, Warning};
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

struct RunOutcome {
    strategy: StrategyKind,
    query_index: usize,
    result: Result<Vec<Document>, String>,
}

impl Pipeline {
    /// Fan out every (query, strategy) pair with bounded parallelism, join
    /// all runs, and fuse the survivors into one ranked list. Fails the
    /// request only when every run failed.
    pub(super) async fn retrieve(&self, mut state: RequestState) -> StepResult {
        let start = std::time::Instant::now();
        let queries = state.queries.clone();

        let mut pending = FuturesUnordered::new();
        for (query_index, query) in queries.iter().enumerate() {
            for strategy in &self.config.retrieve.strategies {
                pending.push(self.run_strategy(*strategy, query_index, query.clone()));
            }
        }
        let total_runs = pending.len();

        let mut runs: Vec<RetrievalRun> = Vec::new();
        let mut failed: Vec<(StrategyKind, String)> = Vec::new();
        while let Some(outcome) = pending.next().await {
            match outcome.result {
                Ok(documents) => {
                    debug!(
                        strategy = %outcome.strategy,
                        query_index = outcome.query_index,
                        docs = documents.len(),
                        "retrieval run completed"
                    );
                    runs.push(RetrievalRun {
                        strategy: outcome.strategy,
                        query_index: outcome.query_index,
                        documents,
                    });
                }
                Err(detail) => {
                    warn!(
                        strategy = %outcome.strategy,
                        query_index = outcome.query_index,
                        %detail,
                        "retrieval run failed"
                    );
                    failed.push((outcome.strategy, detail));
                }
            }
        }

        if runs.is_empty() {
            let detail = failed
                .iter()
                .map(|(s, d)| format!("{}: {}", s, d))
                .collect::<Vec<_>>()
                .join("; ");
            let detail = if detail.is_empty() {
                "no retrieval runs executed".to_string()
            } else {
                detail
            };
            self.sink.record(Event::StepFailed {
                step: "retrieve",
                tag: ErrorTag::RetrieveError,
                detail: detail.clone(),
            });
            state.fail(ErrorTag::RetrieveError, detail);
            return StepResult::Err(state);
        }

        // Partial failure: keep going with what survived, tagging the
        // strategies that lost runs.
        let failed_strategies: HashSet<StrategyKind> =
            failed.iter().map(|(s, _)| *s).collect();
        for strategy in failed_strategies {
            let warning = match strategy {
                StrategyKind::Semantic => Warning::SemanticFailed,
                StrategyKind::Lexical => Warning::LexicalFailed,
            };
            self.warn_step(&mut state, "retrieve", warning);
        }

        let params = FusionParams {
            rrf_k: self.config.retrieve.rrf_k,
            semantic_weight: self.config.retrieve.semantic_weight,
            lexical_weight: self.config.retrieve.lexical_weight,
            limit: self.config.retrieve.max_results,
        };
        state.documents = fuse(&runs, &params);

        state.set_metric("docs", state.documents.len());
        state.set_metric("runs_total", total_runs);
        state.set_metric("runs_failed", failed.len());
        self.sink.record(Event::StepCompleted {
            step: "retrieve",
            elapsed: start.elapsed(),
        });
        StepResult::Ok(state)
    }

    /// One retrieval run. The semaphore bounds how many runs touch the
    /// backends at once; runs are plain futures, so dropping the request
    /// cancels them cooperatively.
    async fn run_strategy(
        &self,
        strategy: StrategyKind,
        query_index: usize,
        query: String,
    ) -> RunOutcome {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return RunOutcome {
                    strategy,
                    query_index,
                    result: Err("retrieval semaphore closed".into()),
                }
            }
        };

        let result = match strategy {
            StrategyKind::Semantic => self.semantic_run(&query).await,
            StrategyKind::Lexical => self.lexical_run(&query).await,
        };

        RunOutcome {
            strategy,
            query_index,
            result: result.map(hits_to_documents).map_err(|e| e.to_string()),
        }
    }

    async fn semantic_run(&self, query: &str) -> Result<Vec<SearchHit>, BackendError> {
        let (Some(embedder), Some(vector)) = (&self.embedder, &self.vector) else {
            return Err(BackendError::Unavailable(
                "semantic strategy has no wired collaborator".into(),
            ));
        };

        // Embedding is cache-backed: identical text across queries and
        // requests embeds once.
        let key = content_key(query);
        let embed_deadline = Duration::from_secs(self.config.timeouts.embedding_secs);
        let policy = self.config.retry;
        let sink = Arc::clone(&self.sink);
        let embedder = Arc::clone(embedder);
        let text = query.to_string();
        let compute = async move {
            with_retry(&policy, sink.as_ref(), "embed", || {
                let call = embedder.embed(&text);
                async move { timed(embed_deadline, call).await }
            })
            .await
        };
        let query_vector = self
            .embedding_cache
            .get_or_compute(&key, compute)
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        let search_deadline = Duration::from_secs(self.config.timeouts.search_secs);
        let top_k = self.config.retrieve.top_k;
        let filter = self.config.retrieve.filter.as_deref();
        with_retry(&self.config.retry, self.sink.as_ref(), "vector_search", || {
            let call = vector.search(&query_vector, top_k, filter);
            async move { timed(search_deadline, call).await }
        })
        .await
    }

    async fn lexical_run(&self, query: &str) -> Result<Vec<SearchHit>, BackendError> {
        let Some(text) = &self.text else {
            return Err(BackendError::Unavailable(
                "lexical strategy has no wired collaborator".into(),
            ));
        };

        let search_deadline = Duration::from_secs(self.config.timeouts.search_secs);
        let top_k = self.config.retrieve.top_k;
        with_retry(&self.config.retry, self.sink.as_ref(), "text_search", || {
            let call = text.search(query, top_k);
            async move { timed(search_deadline, call).await }
        })
        .await
    }
}

fn hits_to_documents(hits: Vec<SearchHit>) -> Vec<Document> {
    hits.into_iter()
        .enumerate()
        .map(|(index, hit)| Document {
            id: hit.id,
            content: hit.content,
            score: hit.score,
            source_rank: index + 1,
            metadata: hit.metadata,
        })
        .collect()
}
