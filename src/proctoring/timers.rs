use std::sync::Arc;

use crate::core::time::Clock;
use crate::proctoring::model::SectionId;
use crate::proctoring::persisted::PersistedState;

/// Whole seconds left in a section started at `started_at_ms`.
///
/// Elapsed time is floored to whole seconds, and the result is clamped to
/// `0..=duration_seconds`, so a start time in the future reports the full duration.
pub(crate) fn remaining_seconds(started_at_ms: i64, now_ms: i64, duration_seconds: u64) -> u64 {
    let elapsed_ms = now_ms.saturating_sub(started_at_ms).max(0);
    let elapsed_seconds = (elapsed_ms / 1000) as u64;
    duration_seconds.saturating_sub(elapsed_seconds)
}

/// Per-section countdowns anchored to persisted absolute start times. There is no stop
/// operation: a started section keeps counting down across reloads until it expires.
#[derive(Clone)]
pub(crate) struct TimerStore {
    state: PersistedState,
    clock: Arc<dyn Clock>,
}

impl TimerStore {
    pub(crate) fn new(state: PersistedState, clock: Arc<dyn Clock>) -> Self {
        Self { state, clock }
    }

    pub(crate) fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Full duration when the section has not been started.
    pub(crate) fn remaining(&self, section: &SectionId, duration_seconds: u64) -> u64 {
        match self.state.section_start(section) {
            Some(started_at) => remaining_seconds(started_at, self.now_millis(), duration_seconds),
            None => duration_seconds,
        }
    }

    pub(crate) fn started_at(&self, section: &SectionId) -> Option<i64> {
        self.state.section_start(section)
    }

    /// Records `now` as the start time unless one exists; returns the effective start.
    pub(crate) fn ensure_started(&self, section: &SectionId) -> i64 {
        if let Some(existing) = self.state.section_start(section) {
            return existing;
        }

        let now = self.now_millis();
        self.state.set_section_start(section, now);
        tracing::info!(section = %section, started_at_ms = now, "Section timer started");
        now
    }
}
