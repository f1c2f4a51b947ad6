use super::{Pipeline, StepResult};
use crate::observe::Event;
use crate::state::{Document, ErrorTag, RequestState, Warning, MAX_ANSWER_CHARS};
use tracing::debug;

pub(crate) const SUMMARY_PROMPT_HEADER: &str =
    "Consolidate the documents below into one factual summary.";
pub(crate) const ANSWER_PROMPT_HEADER: &str =
    "You are an incident-report assistant. Answer using only the supplied sources.";
pub(crate) const DIRECT_PROMPT_HEADER: &str =
    "No historical sources are available. Answer from general operational knowledge.";

impl Pipeline {
    /// Assemble a bounded context from the fused documents, consolidate
    /// them with a single summarization call, then generate the cited
    /// answer. With zero documents there is nothing to ground on: a direct
    /// best-effort answer is produced instead.
    pub(super) async fn synthesize(&self, mut state: RequestState) -> StepResult {
        let start = std::time::Instant::now();

        if state.documents.is_empty() {
            self.warn_step(&mut state, "synthesize", Warning::NoDocuments);
            let prompt = format!(
                "{}\nBe explicit that no matching incident history was found.\n\nQuestion: {}",
                DIRECT_PROMPT_HEADER, state.query
            );
            match self.generate(&prompt, "answer").await {
                Ok(answer) => {
                    state.answer = clip(&answer, MAX_ANSWER_CHARS);
                    state.set_metric("context_chars", 0);
                    self.sink.record(Event::StepCompleted {
                        step: "synthesize",
                        elapsed: start.elapsed(),
                    });
                    return StepResult::Ok(state);
                }
                Err(e) => return self.fail_synthesize(state, e.to_string()),
            }
        }

        let (context, included) = build_context(
            &state.documents,
            self.config.synthesize.max_context_chars,
            &self.config.synthesize.boundary,
        );
        state.context = context;
        state.set_metric("docs_in_context", included);
        state.set_metric("context_chars", state.context.chars().count());

        // One consolidated call for all documents, not one per document.
        let summary_prompt = format!(
            "{}\nKeep every source tag of the form [id] attached to its facts.\n\n\
             Question: {}\n\nDocuments:\n{}",
            SUMMARY_PROMPT_HEADER, state.query, state.context
        );
        let grounding = match self.generate(&summary_prompt, "summary").await {
            Ok(summary) => summary,
            Err(e) => {
                debug!(%e, "consolidated summary failed; using raw context");
                self.warn_step(&mut state, "synthesize", Warning::SummaryFallback);
                state.context.clone()
            }
        };

        let facts = if state.extracted.is_empty() {
            String::new()
        } else {
            format!(
                "\nExtracted monitoring facts:\n{}",
                state
                    .extracted
                    .iter()
                    .flat_map(|f| f.iter())
                    .map(|(k, v)| format!("- {}: {}", k, v))
                    .collect::<Vec<_>>()
                    .join("\n")
            )
        };

        let answer_prompt = format!(
            "{}\nCite the supporting source as [id] after each claim.\n\n\
             Question: {}\n{}\nSources:\n{}",
            ANSWER_PROMPT_HEADER, state.query, facts, grounding
        );
        match self.generate(&answer_prompt, "answer").await {
            Ok(answer) => {
                state.answer = clip(&answer, MAX_ANSWER_CHARS);
                if !state.answer.contains('[') {
                    self.warn_step(&mut state, "synthesize", Warning::CitationMissing);
                }
                self.sink.record(Event::StepCompleted {
                    step: "synthesize",
                    elapsed: start.elapsed(),
                });
                StepResult::Ok(state)
            }
            Err(e) => self.fail_synthesize(state, e.to_string()),
        }
    }

    fn fail_synthesize(&self, mut state: RequestState, detail: String) -> StepResult {
        self.sink.record(Event::StepFailed {
            step: "synthesize",
            tag: ErrorTag::SynthesizeError,
            detail: detail.clone(),
        });
        state.fail(ErrorTag::SynthesizeError, detail);
        StepResult::Err(state)
    }
}

/// Concatenate documents in fused order under a character budget. A
/// document that would overflow the budget ends assembly; documents are
/// never cut mid-body. Returns the context and how many documents made it.
fn build_context(documents: &[Document], max_chars: usize, boundary: &str) -> (String, usize) {
    let separator_chars = boundary.chars().count() + 2;
    let mut pieces: Vec<String> = Vec::new();
    let mut used = 0usize;

    for document in documents {
        let piece = format!("[{}]\n{}", document.id, document.content.trim());
        let cost = piece.chars().count() + if pieces.is_empty() { 0 } else { separator_chars };
        if used + cost > max_chars {
            break;
        }
        used += cost;
        pieces.push(piece);
    }

    let included = pieces.len();
    (pieces.join(&format!("\n{}\n", boundary)), included)
}

fn clip(text: &str, max_chars: usize) -> String {
    text.trim().chars().take(max_chars).collect()
}
