use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::proctoring::model::{SafeRoute, SectionId};
use crate::proctoring::store::FallbackStore;

const CANDIDATE_ID: &str = "candidate_id";
const CANDIDATE_NAME: &str = "candidate_name";
const ACCESS_TOKEN: &str = "access_token";
const COMPLETED_SECTIONS: &str = "completed_sections";
const DISQUALIFIED: &str = "disqualified";
const WARNING_COUNT: &str = "warning_count";
const EXAM_ANSWERS: &str = "exam_answers";
const EXAM_REVIEWS: &str = "exam_reviews";
const EXAM_CODE: &str = "exam_code";
const TIMER_OWNER: &str = "timer_owner";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CandidateIdentity {
    pub(crate) id: String,
    pub(crate) name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct CodeDraft {
    pub(crate) code: String,
    pub(crate) language: String,
}

/// Section answers keyed by section, then question. Coding answers hold the latest
/// serialized attempt.
pub(crate) type AnswerBook = BTreeMap<String, Map<String, Value>>;

/// Typed view over the session's durable keys.
#[derive(Clone)]
pub(crate) struct PersistedState {
    store: Arc<FallbackStore>,
}

impl PersistedState {
    pub(crate) fn new(store: Arc<FallbackStore>) -> Self {
        Self { store }
    }

    pub(crate) fn store(&self) -> &FallbackStore {
        &self.store
    }

    pub(crate) fn candidate(&self) -> Option<CandidateIdentity> {
        let id = self.store.get(CANDIDATE_ID).filter(|id| !id.is_empty())?;
        let name = self.store.get(CANDIDATE_NAME).unwrap_or_default();
        Some(CandidateIdentity { id, name })
    }

    pub(crate) fn set_candidate(&self, identity: &CandidateIdentity) {
        self.store.set(CANDIDATE_ID, &identity.id);
        self.store.set(CANDIDATE_NAME, &identity.name);
    }

    pub(crate) fn access_token(&self) -> Option<String> {
        self.store.get(ACCESS_TOKEN).filter(|token| !token.is_empty())
    }

    pub(crate) fn set_access_token(&self, token: &str) {
        self.store.set(ACCESS_TOKEN, token);
    }

    pub(crate) fn section_start(&self, section: &SectionId) -> Option<i64> {
        let raw = self.store.get(&section_start_key(section))?;
        match raw.trim().parse::<i64>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(section = %section, value = %raw, "Ignoring unreadable section start time");
                None
            }
        }
    }

    pub(crate) fn set_section_start(&self, section: &SectionId, started_at_ms: i64) {
        self.store.set(&section_start_key(section), &started_at_ms.to_string());
    }

    pub(crate) fn clear_section_start(&self, section: &SectionId) {
        self.store.remove(&section_start_key(section));
    }

    /// Candidate whose session started the recorded section clocks.
    pub(crate) fn timer_owner(&self) -> Option<String> {
        self.store.get(TIMER_OWNER)
    }

    pub(crate) fn set_timer_owner(&self, candidate_id: &str) {
        self.store.set(TIMER_OWNER, candidate_id);
    }

    pub(crate) fn completed_sections(&self) -> Vec<SectionId> {
        self.read_json(COMPLETED_SECTIONS).unwrap_or_default()
    }

    pub(crate) fn is_completed(&self, section: &SectionId) -> bool {
        self.completed_sections().contains(section)
    }

    pub(crate) fn mark_completed(&self, section: &SectionId) {
        let mut completed = self.completed_sections();
        if !completed.contains(section) {
            completed.push(section.clone());
            self.write_json(COMPLETED_SECTIONS, &completed);
        }
    }

    pub(crate) fn clear_completed(&self) {
        self.store.remove(COMPLETED_SECTIONS);
    }

    pub(crate) fn is_disqualified(&self) -> bool {
        self.store.get(DISQUALIFIED).as_deref() == Some("true")
    }

    pub(crate) fn set_disqualified(&self) {
        self.store.set(DISQUALIFIED, "true");
    }

    pub(crate) fn warning_count(&self) -> u32 {
        self.store.get(WARNING_COUNT).and_then(|raw| raw.trim().parse().ok()).unwrap_or(0)
    }

    pub(crate) fn set_warning_count(&self, count: u32) {
        self.store.set(WARNING_COUNT, &count.to_string());
    }

    pub(crate) fn answers(&self) -> AnswerBook {
        self.read_json(EXAM_ANSWERS).unwrap_or_default()
    }

    pub(crate) fn section_answers(&self, section: &SectionId) -> Map<String, Value> {
        self.answers().remove(section.as_str()).unwrap_or_default()
    }

    pub(crate) fn set_answer(&self, section: &SectionId, question_id: &str, value: Value) {
        let mut answers = self.answers();
        answers.entry(section.to_string()).or_default().insert(question_id.to_string(), value);
        self.write_json(EXAM_ANSWERS, &answers);
    }

    pub(crate) fn clear_answer(&self, section: &SectionId, question_id: &str) {
        let mut answers = self.answers();
        if let Some(section_answers) = answers.get_mut(section.as_str()) {
            section_answers.remove(question_id);
            self.write_json(EXAM_ANSWERS, &answers);
        }
    }

    pub(crate) fn section_reviews(&self, section: &SectionId) -> Map<String, Value> {
        let mut reviews: AnswerBook = self.read_json(EXAM_REVIEWS).unwrap_or_default();
        reviews.remove(section.as_str()).unwrap_or_default()
    }

    pub(crate) fn set_review(&self, section: &SectionId, question_id: &str, text: &str) {
        let mut reviews: AnswerBook = self.read_json(EXAM_REVIEWS).unwrap_or_default();
        reviews
            .entry(section.to_string())
            .or_default()
            .insert(question_id.to_string(), Value::String(text.to_string()));
        self.write_json(EXAM_REVIEWS, &reviews);
    }

    pub(crate) fn code_draft(&self, question_id: &str) -> Option<CodeDraft> {
        let mut drafts: BTreeMap<String, CodeDraft> = self.read_json(EXAM_CODE).unwrap_or_default();
        drafts.remove(question_id)
    }

    pub(crate) fn set_code_draft(&self, question_id: &str, draft: &CodeDraft) {
        let mut drafts: BTreeMap<String, CodeDraft> = self.read_json(EXAM_CODE).unwrap_or_default();
        drafts.insert(question_id.to_string(), draft.clone());
        self.write_json(EXAM_CODE, &drafts);
    }

    pub(crate) fn token_record(&self, route: SafeRoute) -> Option<String> {
        self.store.get(route.storage_key())
    }

    pub(crate) fn set_token_record(&self, route: SafeRoute, record: &str) {
        self.store.set(route.storage_key(), record);
    }

    pub(crate) fn remove_token_record(&self, route: SafeRoute) {
        self.store.remove(route.storage_key());
    }

    /// Ends the candidate session. Section start times survive so a returning
    /// candidate cannot restart a section clock.
    pub(crate) fn clear_candidate_session(&self) {
        for key in [
            CANDIDATE_ID,
            CANDIDATE_NAME,
            ACCESS_TOKEN,
            COMPLETED_SECTIONS,
            DISQUALIFIED,
            WARNING_COUNT,
            EXAM_ANSWERS,
            EXAM_REVIEWS,
            EXAM_CODE,
        ] {
            self.store.remove(key);
        }
        for route in SafeRoute::ALL {
            self.remove_token_record(route);
        }
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.store.get(key)?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(key, error = %err, "Ignoring unreadable stored value");
                None
            }
        }
    }

    fn write_json<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_string(value) {
            Ok(raw) => self.store.set(key, &raw),
            Err(err) => tracing::error!(key, error = %err, "Failed to encode stored value"),
        }
    }
}

fn section_start_key(section: &SectionId) -> String {
    format!("section_{section}_start")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::memory_state;
    use serde_json::json;

    #[test]
    fn section_start_uses_legacy_key_shape() {
        let state = memory_state();
        state.set_section_start(&"a".into(), 1_700_000_000_000);

        assert_eq!(state.store().get("section_A_start").as_deref(), Some("1700000000000"));
        assert_eq!(state.section_start(&"A".into()), Some(1_700_000_000_000));
    }

    #[test]
    fn unreadable_start_time_reads_as_absent() {
        let state = memory_state();
        state.store().set("section_B_start", "soon");

        assert_eq!(state.section_start(&"B".into()), None);
    }

    #[test]
    fn completed_sections_are_append_only_sets() {
        let state = memory_state();
        state.mark_completed(&"A".into());
        state.mark_completed(&"A".into());
        state.mark_completed(&"B".into());

        assert_eq!(state.completed_sections(), vec![SectionId::new("A"), SectionId::new("B")]);
        assert!(state.is_completed(&"b".into()));
    }

    #[test]
    fn answers_are_grouped_by_section() {
        let state = memory_state();
        state.set_answer(&"A".into(), "1", json!(2));
        state.set_answer(&"A".into(), "2", json!(1));
        state.set_answer(&"B".into(), "1", json!(0));
        state.clear_answer(&"A".into(), "2");

        let section_a = state.section_answers(&"A".into());
        assert_eq!(section_a.get("1"), Some(&json!(2)));
        assert!(section_a.get("2").is_none());
        assert_eq!(state.section_answers(&"B".into()).len(), 1);
    }

    #[test]
    fn clearing_the_session_keeps_timers() {
        let state = memory_state();
        state.set_candidate(&CandidateIdentity { id: "CAND-1".into(), name: "Ada".into() });
        state.set_section_start(&"A".into(), 42);
        state.set_disqualified();
        state.set_warning_count(3);
        state.mark_completed(&"A".into());
        state.set_token_record(SafeRoute::Final, "{}");

        state.clear_candidate_session();

        assert!(state.candidate().is_none());
        assert!(!state.is_disqualified());
        assert_eq!(state.warning_count(), 0);
        assert!(state.completed_sections().is_empty());
        assert!(state.token_record(SafeRoute::Final).is_none());
        assert_eq!(state.section_start(&"A".into()), Some(42));
    }
}
