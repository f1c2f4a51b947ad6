use super::{timed, Pipeline, StepResult};
use crate::cache::content_key;
use crate::config::RouteConfig;
use crate::observe::Event;
use crate::retry::with_retry;
use crate::state::{RequestState, Route, Warning};
use regex::Regex;
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tracing::debug;

pub(crate) const HYDE_PROMPT_HEADER: &str =
    "Draft a plausible knowledge-base article that would answer the question below.";
pub(crate) const EXPANSION_PROMPT_HEADER: &str =
    "Rewrite the question below as alternative phrasings of the same need.";

fn bullet_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[\s\-*•\d.):]+").unwrap())
}

/// FAST unless the query is underspecified: too few words, or hedging
/// vocabulary that signals the user is unsure what they are looking at.
pub(crate) fn decide_route(config: &RouteConfig, query: &str) -> Route {
    let words: Vec<&str> = query.split_whitespace().collect();
    if words.len() < config.short_query_words {
        return Route::Deep;
    }

    let lower = query.to_lowercase();
    let tokens: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    for hedge in &config.hedge_words {
        if tokens.contains(&hedge.to_lowercase().as_str()) {
            return Route::Deep;
        }
    }
    Route::Fast
}

impl Pipeline {
    /// Decide the route and build the query set used for retrieval. Never
    /// fails the request: expansion trouble degrades to the raw query.
    pub(super) async fn plan(&self, mut state: RequestState) -> StepResult {
        let start = std::time::Instant::now();

        state.route = decide_route(&self.config.route, &state.query);
        state.queries = vec![state.query.clone()];

        if state.route == Route::Deep {
            if self.config.plan.use_hyde {
                self.expand_hyde(&mut state).await;
            }
            if self.config.plan.use_multi_query {
                self.expand_multi_query(&mut state).await;
            }
        }

        state.queries.truncate(self.config.plan.max_queries);

        state.set_metric("route", state.route.to_string());
        state.set_metric("queries", state.queries.len());
        self.sink.record(Event::StepCompleted {
            step: "plan",
            elapsed: start.elapsed(),
        });
        StepResult::Ok(state)
    }

    /// HyDE: generate a hypothetical answer document and retrieve with it
    /// instead of the raw query. Cached by the fingerprint of the query
    /// plus any extracted monitoring facts.
    async fn expand_hyde(&self, state: &mut RequestState) {
        let facts = render_facts(state);
        let fingerprint = format!("{}\n{}", state.query, facts);
        let key = content_key(&fingerprint);

        let prompt = format!(
            "{}\nRespond with the article body only.\n\nQuestion: {}\n{}",
            HYDE_PROMPT_HEADER,
            state.query,
            if facts.is_empty() {
                String::new()
            } else {
                format!("\nKnown monitoring facts:\n{}", facts)
            }
        );

        let generator = Arc::clone(&self.generator);
        let sink = Arc::clone(&self.sink);
        let policy = self.config.retry;
        let deadline = Duration::from_secs(self.config.timeouts.generation_secs);
        let compute = async move {
            with_retry(&policy, sink.as_ref(), "hyde", || {
                let call = generator.complete(&prompt);
                async move { timed(deadline, call).await }
            })
            .await
        };

        match self.hyde_cache.get_or_compute(&key, compute).await {
            Ok(pseudo) => {
                let clipped: String = pseudo
                    .trim()
                    .chars()
                    .take(self.config.plan.hyde_max_chars)
                    .collect();
                push_variant(&mut state.queries, clipped);
            }
            Err(e) => {
                debug!(%e, "hyde generation failed; retrieval falls back to the raw query");
                self.warn_step(state, "plan", Warning::HydeFallback);
            }
        }
    }

    /// Multi-query expansion: alternative phrasings of the same need, each
    /// retrieved independently.
    async fn expand_multi_query(&self, state: &mut RequestState) {
        let prompt = format!(
            "{}\nProduce {} variants, one per line, no numbering.\n\nQuestion: {}",
            EXPANSION_PROMPT_HEADER, self.config.plan.expansions, state.query
        );

        match self.generate(&prompt, "multi_query").await {
            Ok(text) => {
                let mut added = 0;
                for line in text.lines() {
                    if added >= self.config.plan.expansions {
                        break;
                    }
                    let variant = bullet_prefix().replace(line, "").trim().to_string();
                    if variant.is_empty() {
                        continue;
                    }
                    if push_variant(&mut state.queries, variant) {
                        added += 1;
                    }
                }
            }
            Err(e) => {
                debug!(%e, "multi-query expansion failed; continuing with fewer variants");
                self.warn_step(state, "plan", Warning::ExpansionFallback);
            }
        }
    }
}

fn render_facts(state: &RequestState) -> String {
    state
        .extracted
        .iter()
        .flat_map(|fact| fact.iter())
        .map(|(k, v)| format!("{}: {}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append a query variant unless blank or a case-insensitive duplicate.
fn push_variant(queries: &mut Vec<String>, candidate: String) -> bool {
    if candidate.is_empty() {
        return false;
    }
    let lower = candidate.to_lowercase();
    if queries.iter().any(|q| q.to_lowercase() == lower) {
        return false;
    }
    queries.push(candidate);
    true
}
