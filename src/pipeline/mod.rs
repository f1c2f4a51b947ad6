mod extract;
mod fusion;
mod plan;
mod retrieve;
mod synthesize;
mod validate;

pub use fusion::{fuse, FusionParams, RetrievalRun};

use crate::cache::SingleFlightCache;
use crate::config::Config;
use crate::error::{BackendError, ConfigError};
use crate::observe::{Event, ObservabilitySink};
use crate::provider::{CheckpointStore, Embedder, Generator, TextSearch, VectorSearch};
use crate::retry::with_retry;
use crate::state::{RequestState, Warning};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// Outcome of one pipeline step. Both arms carry the state forward; the
/// driver branches to the error-handling step on the first `Err`.
pub enum StepResult {
    Ok(RequestState),
    Err(RequestState),
}

/// External collaborators injected into a pipeline. Search-side entries are
/// optional; construction checks they cover the configured strategies.
pub struct Collaborators {
    pub generator: Arc<dyn Generator>,
    pub embedder: Option<Arc<dyn Embedder>>,
    pub vector: Option<Arc<dyn VectorSearch>>,
    pub text: Option<Arc<dyn TextSearch>>,
    pub sink: Arc<dyn ObservabilitySink>,
    pub checkpoints: Option<Arc<dyn CheckpointStore>>,
}

/// The plan → retrieve → synthesize → validate orchestrator. One instance
/// serves many concurrent requests; the two caches are the only mutable
/// state shared across them.
pub struct Pipeline {
    config: Config,
    generator: Arc<dyn Generator>,
    embedder: Option<Arc<dyn Embedder>>,
    vector: Option<Arc<dyn VectorSearch>>,
    text: Option<Arc<dyn TextSearch>>,
    sink: Arc<dyn ObservabilitySink>,
    checkpoints: Option<Arc<dyn CheckpointStore>>,
    hyde_cache: SingleFlightCache<String>,
    embedding_cache: SingleFlightCache<Vec<f32>>,
    semaphore: Arc<Semaphore>,
}

impl Pipeline {
    pub fn new(config: Config, collaborators: Collaborators) -> Result<Self, ConfigError> {
        config.validate()?;

        use crate::config::StrategyKind;
        for strategy in &config.retrieve.strategies {
            let wired = match strategy {
                StrategyKind::Semantic => {
                    collaborators.embedder.is_some() && collaborators.vector.is_some()
                }
                StrategyKind::Lexical => collaborators.text.is_some(),
            };
            if !wired {
                return Err(ConfigError::InvalidValue {
                    field: "retrieve.strategies",
                    reason: format!("strategy '{}' has no wired collaborator", strategy),
                });
            }
        }

        let hyde_cache = SingleFlightCache::new(
            config.caches.hyde.capacity,
            Duration::from_secs(config.caches.hyde.ttl_secs),
        );
        let embedding_cache = SingleFlightCache::new(
            config.caches.embedding.capacity,
            Duration::from_secs(config.caches.embedding.ttl_secs),
        );
        let semaphore = Arc::new(Semaphore::new(config.retrieve.concurrency));

        Ok(Self {
            config,
            generator: collaborators.generator,
            embedder: collaborators.embedder,
            vector: collaborators.vector,
            text: collaborators.text,
            sink: collaborators.sink,
            checkpoints: collaborators.checkpoints,
            hyde_cache,
            embedding_cache,
            semaphore,
        })
    }

    /// Execute the full step graph for one request.
    ///
    /// Every request gets a response: either a grounded answer (possibly
    /// with warnings) or the fixed fallback text for the failing step.
    pub async fn run(&self, state: RequestState, thread_id: Option<&str>) -> RequestState {
        let start = std::time::Instant::now();

        let mut state = match self.extract(state).await {
            StepResult::Ok(s) => s,
            StepResult::Err(s) => return self.finish_failed(s, thread_id, start).await,
        };
        self.checkpoint(&state, "extract", thread_id).await;

        state = match self.plan(state).await {
            StepResult::Ok(s) => s,
            StepResult::Err(s) => return self.finish_failed(s, thread_id, start).await,
        };
        self.checkpoint(&state, "plan", thread_id).await;

        state = match self.retrieve(state).await {
            StepResult::Ok(s) => s,
            StepResult::Err(s) => return self.finish_failed(s, thread_id, start).await,
        };
        self.checkpoint(&state, "retrieve", thread_id).await;

        state = match self.synthesize(state).await {
            StepResult::Ok(s) => s,
            StepResult::Err(s) => return self.finish_failed(s, thread_id, start).await,
        };
        self.checkpoint(&state, "synthesize", thread_id).await;

        state = self.validate_step(state);
        self.checkpoint(&state, "validate", thread_id).await;

        self.finalize(&mut state, start).await;
        state
    }

    /// Error-handling step: entered only when a step set `error`. Maps the
    /// tag to its fixed user-safe message; internal detail goes to metrics
    /// and logs, never into the answer.
    async fn finish_failed(
        &self,
        mut state: RequestState,
        thread_id: Option<&str>,
        start: std::time::Instant,
    ) -> RequestState {
        if let Some(step_error) = state.error.clone() {
            state.answer = step_error.tag.fallback_message().to_string();
            state.set_metric("error_tag", step_error.tag.as_str());
            state.set_metric("error_detail", step_error.detail.clone());
            error!(
                request_id = %state.request_id,
                tag = step_error.tag.as_str(),
                detail = %step_error.detail,
                "pipeline failed; returning fallback answer"
            );
        }
        self.checkpoint(&state, "error", thread_id).await;
        self.finalize(&mut state, start).await;
        state
    }

    async fn finalize(&self, state: &mut RequestState, start: std::time::Instant) {
        state.set_metric("elapsed_ms", start.elapsed().as_millis() as u64);

        let hyde = self.hyde_cache.stats().await;
        let embedding = self.embedding_cache.stats().await;
        state.set_metric("hyde_cache_hits", hyde.hits);
        state.set_metric("hyde_cache_misses", hyde.misses);
        state.set_metric("embedding_cache_hits", embedding.hits);
        state.set_metric("embedding_cache_misses", embedding.misses);
        self.sink.record(Event::CacheSnapshot {
            cache: "hyde",
            hits: hyde.hits,
            misses: hyde.misses,
            size: hyde.size,
        });
        self.sink.record(Event::CacheSnapshot {
            cache: "embedding",
            hits: embedding.hits,
            misses: embedding.misses,
            size: embedding.size,
        });
    }

    async fn checkpoint(&self, state: &RequestState, step: &'static str, thread_id: Option<&str>) {
        let (Some(store), Some(thread_id)) = (&self.checkpoints, thread_id) else {
            return;
        };
        match state.snapshot() {
            Ok(snapshot) => {
                if let Err(e) = store.save(thread_id, step, &snapshot).await {
                    warn!(thread_id, step, %e, "checkpoint save failed");
                }
            }
            Err(e) => warn!(thread_id, step, %e, "state snapshot failed"),
        }
    }

    /// Record a warning on the state and mirror it to the sink.
    pub(super) fn warn_step(&self, state: &mut RequestState, step: &'static str, warning: Warning) {
        state.warn(warning);
        self.sink.record(Event::Warning { step, warning });
    }

    /// Retried generation call with the configured per-call deadline.
    pub(super) async fn generate(
        &self,
        prompt: &str,
        op: &'static str,
    ) -> Result<String, BackendError> {
        let deadline = Duration::from_secs(self.config.timeouts.generation_secs);
        with_retry(&self.config.retry, self.sink.as_ref(), op, || {
            let call = self.generator.complete(prompt);
            async move { timed(deadline, call).await }
        })
        .await
    }
}

/// Enforce a per-call deadline; an elapsed deadline is a retryable failure.
pub(super) async fn timed<T, F>(deadline: Duration, call: F) -> Result<T, BackendError>
where
    F: Future<Output = Result<T, BackendError>>,
{
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(BackendError::Timeout(deadline)),
    }
}
