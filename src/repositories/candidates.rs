use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::Candidate;
use crate::db::types::CandidateRole;

const COLUMNS: &str = "candidate_id, name, hashed_password, role, created_at, updated_at";

pub(crate) async fn find_by_id(
    pool: &PgPool,
    candidate_id: &str,
) -> Result<Option<Candidate>, sqlx::Error> {
    sqlx::query_as::<_, Candidate>(&format!(
        "SELECT {COLUMNS} FROM candidates WHERE candidate_id = $1"
    ))
    .bind(candidate_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn count_by_role(
    pool: &PgPool,
    role: CandidateRole,
) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM candidates WHERE role = $1")
        .bind(role)
        .fetch_one(pool)
        .await
}

pub(crate) struct CreateCandidate<'a> {
    pub candidate_id: &'a str,
    pub name: &'a str,
    pub hashed_password: String,
    pub role: CandidateRole,
    pub now: PrimitiveDateTime,
}

/// Inserts the candidate unless the identifier is taken; returns whether a row was added.
pub(crate) async fn create_if_absent(
    pool: &PgPool,
    params: CreateCandidate<'_>,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO candidates (candidate_id, name, hashed_password, role, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$5)
         ON CONFLICT (candidate_id) DO NOTHING",
    )
    .bind(params.candidate_id)
    .bind(params.name)
    .bind(params.hashed_password)
    .bind(params.role)
    .bind(params.now)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub(crate) async fn update_credentials(
    pool: &PgPool,
    candidate_id: &str,
    hashed_password: &str,
    role: CandidateRole,
    now: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE candidates
         SET hashed_password = $1, role = $2, updated_at = $3
         WHERE candidate_id = $4",
    )
    .bind(hashed_password)
    .bind(role)
    .bind(now)
    .bind(candidate_id)
    .execute(pool)
    .await?;

    Ok(())
}
