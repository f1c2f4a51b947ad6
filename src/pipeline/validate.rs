use super::Pipeline;
use crate::observe::Event;
use crate::state::{RequestState, Warning};

impl Pipeline {
    /// Pure terminal checks. Warnings only; a thin answer is still an
    /// answer.
    pub(super) fn validate_step(&self, mut state: RequestState) -> RequestState {
        let start = std::time::Instant::now();

        if state.documents.len() < self.config.validate.min_docs {
            self.warn_step(&mut state, "validate", Warning::LowDocs);
        }
        if state.answer.chars().count() < self.config.validate.min_answer_chars {
            self.warn_step(&mut state, "validate", Warning::ShortAnswer);
        }

        state.set_metric("warnings", state.warnings.len());
        self.sink.record(Event::StepCompleted {
            step: "validate",
            elapsed: start.elapsed(),
        });
        state
    }
}
