use crate::state::{ErrorTag, Warning};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Structured events emitted by the pipeline. Write-only: nothing in the
/// core reads these back to make decisions.
#[derive(Debug, Clone)]
pub enum Event {
    Retry {
        op: &'static str,
        attempt: u32,
        delay: Duration,
        error: String,
    },
    StepCompleted {
        step: &'static str,
        elapsed: Duration,
    },
    StepFailed {
        step: &'static str,
        tag: ErrorTag,
        detail: String,
    },
    Warning {
        step: &'static str,
        warning: Warning,
    },
    CacheSnapshot {
        cache: &'static str,
        hits: u64,
        misses: u64,
        size: usize,
    },
}

pub trait ObservabilitySink: Send + Sync {
    fn record(&self, event: Event);
}

/// Default sink: forwards events to `tracing`.
pub struct TracingSink;

impl ObservabilitySink for TracingSink {
    fn record(&self, event: Event) {
        match event {
            Event::Retry {
                op,
                attempt,
                delay,
                error,
            } => warn!(op, attempt, ?delay, %error, "retrying after transient failure"),
            Event::StepCompleted { step, elapsed } => {
                info!(step, ?elapsed, "step completed")
            }
            Event::StepFailed { step, tag, detail } => {
                warn!(step, tag = tag.as_str(), %detail, "step failed")
            }
            Event::Warning { step, warning } => {
                warn!(step, warning = warning.as_str(), "step warning")
            }
            Event::CacheSnapshot {
                cache,
                hits,
                misses,
                size,
            } => debug!(cache, hits, misses, size, "cache stats"),
        }
    }
}

/// Discards every event. Useful in tests.
pub struct NullSink;

impl ObservabilitySink for NullSink {
    fn record(&self, _event: Event) {}
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Captures events for assertions.
    #[derive(Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<Event>>,
    }

    impl ObservabilitySink for RecordingSink {
        fn record(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl RecordingSink {
        pub fn retries(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, Event::Retry { .. }))
                .count()
        }
    }
}
