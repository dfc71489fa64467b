use serde::{Deserialize, Serialize};
use sqlx::Type;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "candidaterole", rename_all = "lowercase")]
pub(crate) enum CandidateRole {
    Candidate,
    Admin,
}
