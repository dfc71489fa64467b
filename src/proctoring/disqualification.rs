use crate::proctoring::detector::{Violation, ViolationKind};
use crate::proctoring::persisted::PersistedState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProctorStatus {
    Clean { warnings: u32 },
    Disqualified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Escalation {
    /// Already disqualified, or the same focus-loss incident reported twice.
    Ignored,
    Warned { count: u32, remaining: u32 },
    /// Emitted exactly once per candidate session.
    Disqualified { count: u32 },
}

/// Turns violations into warnings and, at the limit, a terminal disqualification.
///
/// A focus loss arms a latch that swallows further focus-loss signals until focus or
/// visibility comes back, so blur + hidden from one tab switch count once.
#[derive(Clone)]
pub(crate) struct DisqualificationController {
    state: PersistedState,
    max_warnings: u32,
    status: ProctorStatus,
    focus_latched: bool,
}

impl DisqualificationController {
    pub(crate) fn restore(state: PersistedState, max_warnings: u32) -> Self {
        let max_warnings = max_warnings.max(1);
        let warnings = state.warning_count().min(max_warnings);

        let status = if state.is_disqualified() || warnings >= max_warnings {
            if !state.is_disqualified() {
                state.set_disqualified();
            }
            ProctorStatus::Disqualified
        } else {
            ProctorStatus::Clean { warnings }
        };

        Self { state, max_warnings, status, focus_latched: false }
    }

    pub(crate) fn is_disqualified(&self) -> bool {
        matches!(self.status, ProctorStatus::Disqualified)
    }

    pub(crate) fn warnings(&self) -> u32 {
        match self.status {
            ProctorStatus::Clean { warnings } => warnings,
            ProctorStatus::Disqualified => self.state.warning_count().min(self.max_warnings),
        }
    }

    pub(crate) fn max_warnings(&self) -> u32 {
        self.max_warnings
    }

    pub(crate) fn focus_regained(&mut self) {
        self.focus_latched = false;
    }

    /// Forgets the in-memory status after the candidate session was cleared.
    pub(crate) fn reset(&mut self) {
        self.status = ProctorStatus::Clean { warnings: 0 };
        self.focus_latched = false;
    }

    pub(crate) fn record(&mut self, violation: &Violation) -> Escalation {
        let ProctorStatus::Clean { warnings } = self.status else {
            return Escalation::Ignored;
        };

        if violation.kind == ViolationKind::FocusLoss {
            if self.focus_latched {
                return Escalation::Ignored;
            }
            self.focus_latched = true;
        }

        let count = warnings + 1;
        self.state.set_warning_count(count);

        if count >= self.max_warnings {
            self.state.set_disqualified();
            self.status = ProctorStatus::Disqualified;
            tracing::warn!(warnings = count, reason = %violation.reason, "Candidate disqualified");
            return Escalation::Disqualified { count };
        }

        self.status = ProctorStatus::Clean { warnings: count };
        tracing::warn!(
            warnings = count,
            max_warnings = self.max_warnings,
            reason = %violation.reason,
            "Proctoring violation recorded"
        );
        Escalation::Warned { count, remaining: self.max_warnings - count }
    }
}
