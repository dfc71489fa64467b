use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::models::Candidate;
use crate::db::types::CandidateRole;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub(crate) struct LoginRequest {
    #[validate(length(min = 1, max = 64, message = "candidate_id is required"))]
    #[serde(alias = "candidateId")]
    pub(crate) candidate_id: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub(crate) password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CandidateSummary {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) is_admin: bool,
}

impl CandidateSummary {
    pub(crate) fn from_db(candidate: &Candidate) -> Self {
        Self {
            id: candidate.candidate_id.clone(),
            name: candidate.name.clone(),
            is_admin: candidate.role == CandidateRole::Admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct LoginResponse {
    pub(crate) access_token: String,
    pub(crate) token_type: String,
    pub(crate) candidate: CandidateSummary,
}
