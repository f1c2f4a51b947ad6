use super::{Pipeline, StepResult};
use crate::observe::Event;
use crate::state::{ErrorTag, RequestState};
use std::collections::BTreeMap;
use tracing::debug;

pub(crate) const EXTRACT_PROMPT_HEADER: &str =
    "Extract structured facts from the monitoring texts below.";

impl Pipeline {
    /// Optional pre-step: turn raw log/alert texts into structured facts
    /// through a single generation call. Fatal when enabled and the call or
    /// its output cannot be salvaged.
    pub(super) async fn extract(&self, mut state: RequestState) -> StepResult {
        if !self.config.extraction.enabled || state.raw_texts.is_empty() {
            return StepResult::Ok(state);
        }
        let start = std::time::Instant::now();

        let prompt = format!(
            "{}\nRespond with a JSON array of objects, each holding string \
             fields \"entity\" and \"value\". No prose.\n\nTexts:\n{}",
            EXTRACT_PROMPT_HEADER,
            state.raw_texts.join("\n---\n")
        );

        let raw = match self.generate(&prompt, "extract").await {
            Ok(raw) => raw,
            Err(e) => {
                let detail = e.to_string();
                self.sink.record(Event::StepFailed {
                    step: "extract",
                    tag: ErrorTag::ExtractError,
                    detail: detail.clone(),
                });
                state.fail(ErrorTag::ExtractError, detail);
                return StepResult::Err(state);
            }
        };

        match parse_facts(&raw) {
            Some(facts) => {
                debug!(count = facts.len(), "extracted structured facts");
                state.set_metric("extracted", facts.len());
                state.extracted = facts;
                self.sink.record(Event::StepCompleted {
                    step: "extract",
                    elapsed: start.elapsed(),
                });
                StepResult::Ok(state)
            }
            None => {
                let detail = format!("unparseable extraction output: {:.120}", raw);
                self.sink.record(Event::StepFailed {
                    step: "extract",
                    tag: ErrorTag::ExtractError,
                    detail: detail.clone(),
                });
                state.fail(ErrorTag::ExtractError, detail);
                StepResult::Err(state)
            }
        }
    }
}

/// Pull the first JSON array out of generator output, tolerating prose and
/// code fences around it.
fn parse_facts(raw: &str) -> Option<Vec<BTreeMap<String, String>>> {
    let open = raw.find('[')?;
    let close = raw.rfind(']')?;
    if close <= open {
        return None;
    }
    serde_json::from_str(&raw[open..=close]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bare_array() {
        let facts = parse_facts(r#"[{"entity":"host","value":"web-01"}]"#).unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0]["entity"], "host");
    }

    #[test]
    fn parses_fenced_array_with_prose() {
        let raw = "Here are the facts:\n```json\n[{\"entity\":\"cpu\",\"value\":\"97%\"}]\n```";
        let facts = parse_facts(raw).unwrap();
        assert_eq!(facts[0]["value"], "97%");
    }

    #[test]
    fn rejects_output_without_array() {
        assert!(parse_facts("no structured data found").is_none());
        assert!(parse_facts("]] oops [[").is_none());
    }
}
