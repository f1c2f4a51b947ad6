use crate::config::StrategyKind;
use crate::state::Document;
use std::collections::BTreeMap;

/// Ranked output of one (query, strategy) pair. Lives only long enough to
/// be fused.
#[derive(Debug)]
pub struct RetrievalRun {
    pub strategy: StrategyKind,
    pub query_index: usize,
    pub documents: Vec<Document>,
}

#[derive(Debug, Clone, Copy)]
pub struct FusionParams {
    /// RRF smoothing constant; larger values flatten rank differences.
    pub rrf_k: f64,
    pub semantic_weight: f64,
    pub lexical_weight: f64,
    /// Fused output is truncated to this many documents.
    pub limit: usize,
}

struct Fused {
    score: f64,
    best_rank: usize,
    document: Document,
}

/// Reciprocal Rank Fusion across heterogeneous runs.
///
/// A document's fused score is `Σ weight(strategy) / (rrf_k + rank)` over
/// every run it appears in, rank 1-based within the run. Raw strategy
/// scores are ignored entirely; they are not comparable across strategies.
/// Ties break by best single-run rank, then by id, so the output order is
/// deterministic for fixed inputs. The copy of a duplicated document with
/// the best rank supplies content and metadata.
pub fn fuse(runs: &[RetrievalRun], params: &FusionParams) -> Vec<Document> {
    let mut by_id: BTreeMap<&str, Fused> = BTreeMap::new();

    for run in runs {
        let weight = match run.strategy {
            StrategyKind::Semantic => params.semantic_weight,
            StrategyKind::Lexical => params.lexical_weight,
        };
        for (index, document) in run.documents.iter().enumerate() {
            let rank = index + 1;
            let contribution = weight / (params.rrf_k + rank as f64);
            by_id
                .entry(document.id.as_str())
                .and_modify(|fused| {
                    fused.score += contribution;
                    if rank < fused.best_rank {
                        fused.best_rank = rank;
                        fused.document = document.clone();
                    }
                })
                .or_insert_with(|| Fused {
                    score: contribution,
                    best_rank: rank,
                    document: document.clone(),
                });
        }
    }

    let mut fused: Vec<Fused> = by_id.into_values().collect();
    fused.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.best_rank.cmp(&b.best_rank))
            .then_with(|| a.document.id.cmp(&b.document.id))
    });
    fused.truncate(params.limit);

    fused
        .into_iter()
        .map(|f| Document {
            score: f.score,
            source_rank: f.best_rank,
            ..f.document
        })
        .collect()
}
