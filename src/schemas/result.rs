use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::ResultRecord;

/// Progress for one section. Sent by the proctoring runtime after warnings, section
/// changes, code runs and disqualification; the backend merges it into the candidate's
/// aggregate result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub(crate) struct SubmitRequest {
    #[validate(length(min = 1, message = "candidate_id is required"))]
    #[serde(alias = "candidateId")]
    pub(crate) candidate_id: String,
    #[validate(length(min = 1, message = "section is required"))]
    pub(crate) section: String,
    #[serde(default)]
    pub(crate) disqualified: bool,
    #[serde(default, alias = "warningCount")]
    pub(crate) warning_count: u32,
    #[serde(default)]
    pub(crate) answers: Map<String, Value>,
    #[serde(default)]
    pub(crate) reviews: Map<String, Value>,
    #[serde(default)]
    pub(crate) code: Option<String>,
    #[serde(default)]
    pub(crate) language: Option<String>,
    #[validate(range(min = 0, message = "score must not be negative"))]
    #[serde(default)]
    pub(crate) score: Option<i64>,
    #[serde(default)]
    pub(crate) output: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SubmitResponse {
    pub(crate) message: String,
    pub(crate) total_score: i64,
    pub(crate) sections_completed: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ResultResponse {
    pub(crate) candidate_id: String,
    pub(crate) answers: Value,
    pub(crate) reviews: Value,
    pub(crate) section_scores: BTreeMap<String, i64>,
    pub(crate) total_score: i64,
    pub(crate) code: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) last_section: Option<String>,
    pub(crate) last_output: Option<String>,
    pub(crate) disqualified: bool,
    pub(crate) warning_count: i32,
    pub(crate) sections_completed: Vec<String>,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl ResultResponse {
    pub(crate) fn from_db(record: ResultRecord) -> Self {
        Self {
            candidate_id: record.candidate_id,
            answers: record.answers.0,
            reviews: record.reviews.0,
            section_scores: record.section_scores.0,
            total_score: record.total_score,
            code: record.code,
            language: record.language,
            last_section: record.last_section,
            last_output: record.last_output,
            disqualified: record.disqualified,
            warning_count: record.warning_count,
            sections_completed: record.sections_completed.0,
            created_at: format_primitive(record.created_at),
            updated_at: format_primitive(record.updated_at),
        }
    }
}
