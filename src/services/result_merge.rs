use std::collections::BTreeMap;

use serde_json::{Map, Value};
use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::ResultRecord;
use crate::schemas::result::SubmitRequest;

/// Folds one submission into the candidate's aggregate. `existing` is `None` for the
/// first submission.
pub(crate) fn merge(
    existing: Option<ResultRecord>,
    incoming: &SubmitRequest,
    now: PrimitiveDateTime,
) -> ResultRecord {
    let mut record = existing.unwrap_or_else(|| empty_record(&incoming.candidate_id, now));
    let section = incoming.section.as_str();

    merge_section_map(&mut record.answers.0, section, &incoming.answers);
    merge_section_map(&mut record.reviews.0, section, &incoming.reviews);

    if let Some(code) = incoming.code.as_deref().filter(|code| !code.is_empty()) {
        record.code = Some(code.to_string());
    }
    if let Some(language) = incoming.language.as_deref().filter(|lang| !lang.is_empty()) {
        record.language = Some(language.to_string());
    }

    if let Some(score) = incoming.score {
        record.section_scores.0.insert(section.to_string(), score);
        record.total_score = record.section_scores.0.values().sum();
    }

    record.disqualified = record.disqualified || incoming.disqualified;
    let incoming_warnings = i32::try_from(incoming.warning_count).unwrap_or(i32::MAX);
    record.warning_count = record.warning_count.max(incoming_warnings);

    if !record.sections_completed.0.iter().any(|done| done == section) {
        record.sections_completed.0.push(section.to_string());
    }

    if incoming.output.is_some() {
        record.last_output = incoming.output.clone();
    }
    record.last_section = Some(section.to_string());
    record.updated_at = now;

    record
}

fn empty_record(candidate_id: &str, now: PrimitiveDateTime) -> ResultRecord {
    ResultRecord {
        candidate_id: candidate_id.to_string(),
        answers: Json(Value::Object(Map::new())),
        reviews: Json(Value::Object(Map::new())),
        section_scores: Json(BTreeMap::new()),
        total_score: 0,
        code: None,
        language: None,
        last_section: None,
        last_output: None,
        disqualified: false,
        warning_count: 0,
        sections_completed: Json(Vec::new()),
        created_at: now,
        updated_at: now,
    }
}

/// `target[section] = target[section] ∪ incoming`, incoming keys winning. A stored value
/// that is not an object is replaced.
fn merge_section_map(target: &mut Value, section: &str, incoming: &Map<String, Value>) {
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Some(sections) = target.as_object_mut() else {
        return;
    };

    let entry = sections.entry(section.to_string()).or_insert_with(|| Value::Object(Map::new()));
    if !entry.is_object() {
        *entry = Value::Object(Map::new());
    }
    if let Some(existing) = entry.as_object_mut() {
        for (key, value) in incoming {
            existing.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::time::primitive_now_utc;
    use serde_json::json;

    fn submission(value: Value) -> SubmitRequest {
        serde_json::from_value(value).expect("submission")
    }

    #[test]
    fn first_submission_creates_record() {
        let now = primitive_now_utc();
        let record = merge(
            None,
            &submission(json!({
                "candidate_id": "CAND-1",
                "section": "A",
                "answers": {"1": 2},
                "score": 1,
                "warning_count": 1
            })),
            now,
        );

        assert_eq!(record.candidate_id, "CAND-1");
        assert_eq!(record.answers.0, json!({"A": {"1": 2}}));
        assert_eq!(record.section_scores.0.get("A"), Some(&1));
        assert_eq!(record.total_score, 1);
        assert_eq!(record.warning_count, 1);
        assert_eq!(record.sections_completed.0, vec!["A".to_string()]);
        assert_eq!(record.last_section.as_deref(), Some("A"));
    }

    #[test]
    fn answers_union_per_section_with_incoming_winning() {
        let now = primitive_now_utc();
        let first = merge(
            None,
            &submission(json!({
                "candidate_id": "CAND-1",
                "section": "A",
                "answers": {"1": 0, "2": 1}
            })),
            now,
        );
        let second = merge(
            Some(first),
            &submission(json!({
                "candidate_id": "CAND-1",
                "section": "A",
                "answers": {"2": 3, "4": 0}
            })),
            now,
        );
        let third = merge(
            Some(second),
            &submission(json!({
                "candidate_id": "CAND-1",
                "section": "B",
                "answers": {"9": 1}
            })),
            now,
        );

        assert_eq!(third.answers.0, json!({"A": {"1": 0, "2": 3, "4": 0}, "B": {"9": 1}}));
        assert_eq!(third.sections_completed.0, vec!["A".to_string(), "B".to_string()]);
    }

    #[test]
    fn total_is_sum_of_latest_section_scores() {
        let now = primitive_now_utc();
        let mut record = None;
        for (section, score) in [("A", 2), ("B", 3), ("A", 1)] {
            record = Some(merge(
                record,
                &submission(json!({"candidate_id": "C", "section": section, "score": score})),
                now,
            ));
        }
        let record = record.expect("record");

        assert_eq!(record.total_score, 4);
        assert_eq!(record.sections_completed.0.len(), 2);
    }

    #[test]
    fn missing_score_keeps_section_score() {
        let now = primitive_now_utc();
        let first =
            merge(None, &submission(json!({"candidate_id": "C", "section": "A", "score": 5})), now);
        let second =
            merge(Some(first), &submission(json!({"candidate_id": "C", "section": "A"})), now);

        assert_eq!(second.total_score, 5);
    }

    #[test]
    fn disqualification_is_sticky_and_warnings_keep_maximum() {
        let now = primitive_now_utc();
        let first = merge(
            None,
            &submission(json!({
                "candidate_id": "C", "section": "A", "disqualified": true, "warning_count": 3
            })),
            now,
        );
        let second = merge(
            Some(first),
            &submission(json!({
                "candidate_id": "C", "section": "B", "disqualified": false, "warning_count": 1
            })),
            now,
        );

        assert!(second.disqualified);
        assert_eq!(second.warning_count, 3);
    }

    #[test]
    fn empty_code_does_not_overwrite() {
        let now = primitive_now_utc();
        let first = merge(
            None,
            &submission(json!({
                "candidate_id": "C", "section": "C", "code": "print(1)", "language": "Python",
                "output": "Task c1: PASS"
            })),
            now,
        );
        let second = merge(
            Some(first),
            &submission(json!({
                "candidate_id": "C", "section": "C", "code": "", "language": "",
                "output": "Task c1: FAIL"
            })),
            now,
        );

        assert_eq!(second.code.as_deref(), Some("print(1)"));
        assert_eq!(second.language.as_deref(), Some("Python"));
        assert_eq!(second.last_output.as_deref(), Some("Task c1: FAIL"));
    }
}
