use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::CandidateRole;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct Candidate {
    pub(crate) candidate_id: String,
    pub(crate) name: String,
    pub(crate) hashed_password: String,
    pub(crate) role: CandidateRole,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamRecord {
    pub(crate) id: String,
    pub(crate) title: String,
    pub(crate) definition: Json<serde_json::Value>,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

/// Aggregate progress for one candidate. `answers` is keyed by section, then question.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ResultRecord {
    pub(crate) candidate_id: String,
    pub(crate) answers: Json<serde_json::Value>,
    pub(crate) reviews: Json<serde_json::Value>,
    pub(crate) section_scores: Json<BTreeMap<String, i64>>,
    pub(crate) total_score: i64,
    pub(crate) code: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) last_section: Option<String>,
    pub(crate) last_output: Option<String>,
    pub(crate) disqualified: bool,
    pub(crate) warning_count: i32,
    pub(crate) sections_completed: Json<Vec<String>>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}
