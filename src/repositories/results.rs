use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ResultRecord;

const COLUMNS: &str = "\
    candidate_id, answers, reviews, section_scores, total_score, code, language, \
    last_section, last_output, disqualified, warning_count, sections_completed, \
    created_at, updated_at";

pub(crate) async fn find(
    executor: impl sqlx::PgExecutor<'_>,
    candidate_id: &str,
) -> Result<Option<ResultRecord>, sqlx::Error> {
    sqlx::query_as::<_, ResultRecord>(&format!(
        "SELECT {COLUMNS} FROM results WHERE candidate_id = $1"
    ))
    .bind(candidate_id)
    .fetch_optional(executor)
    .await
}

pub(crate) async fn list_ranked(pool: &PgPool) -> Result<Vec<ResultRecord>, sqlx::Error> {
    sqlx::query_as::<_, ResultRecord>(&format!(
        "SELECT {COLUMNS} FROM results ORDER BY total_score DESC, created_at ASC"
    ))
    .fetch_all(pool)
    .await
}

/// Serializes concurrent submissions for one candidate until the transaction ends.
pub(crate) async fn lock_candidate(
    executor: impl sqlx::PgExecutor<'_>,
    candidate_id: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(candidate_id)
        .execute(executor)
        .await?;
    Ok(())
}

pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    record: &ResultRecord,
) -> Result<ResultRecord, sqlx::Error> {
    sqlx::query_as::<_, ResultRecord>(&format!(
        "INSERT INTO results (
            candidate_id, answers, reviews, section_scores, total_score, code, language,
            last_section, last_output, disqualified, warning_count, sections_completed,
            created_at, updated_at
        ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14)
        ON CONFLICT (candidate_id) DO UPDATE SET
            answers = EXCLUDED.answers,
            reviews = EXCLUDED.reviews,
            section_scores = EXCLUDED.section_scores,
            total_score = EXCLUDED.total_score,
            code = EXCLUDED.code,
            language = EXCLUDED.language,
            last_section = EXCLUDED.last_section,
            last_output = EXCLUDED.last_output,
            disqualified = EXCLUDED.disqualified,
            warning_count = EXCLUDED.warning_count,
            sections_completed = EXCLUDED.sections_completed,
            updated_at = EXCLUDED.updated_at
        RETURNING {COLUMNS}"
    ))
    .bind(&record.candidate_id)
    .bind(&record.answers)
    .bind(&record.reviews)
    .bind(&record.section_scores)
    .bind(record.total_score)
    .bind(&record.code)
    .bind(&record.language)
    .bind(&record.last_section)
    .bind(&record.last_output)
    .bind(record.disqualified)
    .bind(record.warning_count)
    .bind(&record.sections_completed)
    .bind(record.created_at)
    .bind(record.updated_at)
    .fetch_one(executor)
    .await
}

pub(crate) async fn append_log(
    executor: impl sqlx::PgExecutor<'_>,
    candidate_id: &str,
    section: &str,
    payload: serde_json::Value,
    received_at: PrimitiveDateTime,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO submission_log (candidate_id, section, payload, received_at)
         VALUES ($1,$2,$3,$4)",
    )
    .bind(candidate_id)
    .bind(section)
    .bind(Json(payload))
    .bind(received_at)
    .execute(executor)
    .await?;
    Ok(())
}
