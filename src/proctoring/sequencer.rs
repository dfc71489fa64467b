use std::collections::HashSet;

use serde::Serialize;

use crate::proctoring::model::{ExamPlan, SectionId, SectionKind, SectionPlan};
use crate::proctoring::persisted::PersistedState;
use crate::proctoring::timers::TimerStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum SectionStatus {
    NotStarted,
    InProgress,
    Completed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Selecting,
    InSection { section: SectionId },
    AllCompleted,
    Finished,
    Disqualified,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct SectionView {
    pub(crate) id: SectionId,
    pub(crate) name: String,
    pub(crate) kind: SectionKind,
    pub(crate) status: SectionStatus,
    pub(crate) duration_seconds: u64,
    pub(crate) remaining_seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum EnterOutcome {
    Entered { section: SectionId, remaining_seconds: u64 },
    AlreadyCompleted,
    Expired,
    Unknown,
    Halted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AdvanceOutcome {
    Entered { from: SectionId, to: SectionId, remaining_seconds: u64 },
    ToSelection { from: SectionId },
    NotInSection,
}

/// Ordered, one-way progression through the exam's sections.
pub(crate) struct SectionSequencer {
    plan: ExamPlan,
    timers: TimerStore,
    state: PersistedState,
    phase: Phase,
    expiry_reported: HashSet<SectionId>,
}

impl SectionSequencer {
    pub(crate) fn new(plan: ExamPlan, timers: TimerStore, state: PersistedState) -> Self {
        let mut sequencer =
            Self { plan, timers, state, phase: Phase::Selecting, expiry_reported: HashSet::new() };
        sequencer.phase = sequencer.selection_phase();
        sequencer
    }

    pub(crate) fn plan(&self) -> &ExamPlan {
        &self.plan
    }

    pub(crate) fn current(&self) -> Option<&SectionPlan> {
        match &self.phase {
            Phase::InSection { section } => self.plan.section(section),
            _ => None,
        }
    }

    pub(crate) fn is_halted(&self) -> bool {
        matches!(self.phase, Phase::Finished | Phase::Disqualified)
    }

    pub(crate) fn status(&self, section: &SectionPlan) -> SectionStatus {
        if self.state.is_completed(&section.id) {
            return SectionStatus::Completed;
        }
        match self.timers.started_at(&section.id) {
            None => SectionStatus::NotStarted,
            Some(_) if self.timers.remaining(&section.id, section.duration_seconds) == 0 => {
                SectionStatus::Expired
            }
            Some(_) => SectionStatus::InProgress,
        }
    }

    pub(crate) fn views(&self) -> Vec<SectionView> {
        self.plan
            .sections()
            .iter()
            .map(|section| SectionView {
                id: section.id.clone(),
                name: section.name.clone(),
                kind: section.kind,
                status: self.status(section),
                duration_seconds: section.duration_seconds,
                remaining_seconds: self.timers.remaining(&section.id, section.duration_seconds),
            })
            .collect()
    }

    /// Starts the section clock if needed; refuses completed and expired sections.
    pub(crate) fn enter(&mut self, section: &SectionId) -> EnterOutcome {
        if self.is_halted() {
            return EnterOutcome::Halted;
        }
        let Some(plan) = self.plan.section(section) else {
            return EnterOutcome::Unknown;
        };
        if self.state.is_completed(&plan.id) {
            return EnterOutcome::AlreadyCompleted;
        }

        let id = plan.id.clone();
        let duration = plan.duration_seconds;
        self.timers.ensure_started(&id);
        let remaining_seconds = self.timers.remaining(&id, duration);
        if remaining_seconds == 0 {
            tracing::info!(section = %id, "Entry refused; section expired");
            return EnterOutcome::Expired;
        }

        tracing::info!(section = %id, remaining_seconds, "Section entered");
        self.phase = Phase::InSection { section: id.clone() };
        EnterOutcome::Entered { section: id, remaining_seconds }
    }

    /// The active section's id the first time its timer is observed at zero.
    pub(crate) fn tick(&mut self) -> Option<SectionId> {
        let current = self.current()?;
        let id = current.id.clone();
        if self.timers.remaining(&id, current.duration_seconds) > 0 {
            return None;
        }
        if self.expiry_reported.insert(id.clone()) {
            tracing::info!(section = %id, "Section timer expired");
            Some(id)
        } else {
            None
        }
    }

    /// Completes the active section and moves to the next available one, skipping
    /// completed and expired sections; falls back to section selection.
    pub(crate) fn advance(&mut self) -> AdvanceOutcome {
        let Phase::InSection { section: from } = self.phase.clone() else {
            return AdvanceOutcome::NotInSection;
        };

        self.state.mark_completed(&from);
        let start = self.plan.position(&from).map(|index| index + 1).unwrap_or(usize::MAX);

        let candidates: Vec<(SectionId, u64)> = self
            .plan
            .sections()
            .iter()
            .skip(start)
            .map(|section| (section.id.clone(), section.duration_seconds))
            .collect();

        for (id, duration) in candidates {
            if self.state.is_completed(&id) {
                continue;
            }
            self.timers.ensure_started(&id);
            let remaining_seconds = self.timers.remaining(&id, duration);
            if remaining_seconds == 0 {
                tracing::info!(section = %id, "Skipping expired section");
                continue;
            }
            tracing::info!(from = %from, to = %id, remaining_seconds, "Advanced to next section");
            self.phase = Phase::InSection { section: id.clone() };
            return AdvanceOutcome::Entered { from, to: id, remaining_seconds };
        }

        self.phase = self.selection_phase();
        tracing::info!(from = %from, "No further section available; back to selection");
        AdvanceOutcome::ToSelection { from }
    }

    pub(crate) fn leave_to_selection(&mut self) {
        if !self.is_halted() {
            self.phase = self.selection_phase();
        }
    }

    pub(crate) fn all_completed(&self) -> bool {
        self.plan.ids().all(|id| self.state.is_completed(id))
    }

    /// Moves to `Finished` when every section is completed; otherwise a no-op.
    pub(crate) fn finish(&mut self) -> bool {
        if self.phase == Phase::Disqualified || !self.all_completed() {
            return false;
        }
        self.phase = Phase::Finished;
        true
    }

    pub(crate) fn halt(&mut self) {
        self.phase = Phase::Disqualified;
    }

    /// Back to the initial phase after the candidate session was cleared.
    pub(crate) fn reset(&mut self) {
        self.expiry_reported.clear();
        self.phase = self.selection_phase();
    }

    fn selection_phase(&self) -> Phase {
        if self.all_completed() {
            Phase::AllCompleted
        } else {
            Phase::Selecting
        }
    }
}
