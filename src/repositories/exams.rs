use sqlx::types::Json;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::ExamRecord;

const COLUMNS: &str = "id, title, definition, is_active, created_at, updated_at";

/// Most recently created active exam.
pub(crate) async fn find_active(pool: &PgPool) -> Result<Option<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "SELECT {COLUMNS} FROM exams WHERE is_active = TRUE ORDER BY created_at DESC LIMIT 1"
    ))
    .fetch_optional(pool)
    .await
}

pub(crate) async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM exams").fetch_one(pool).await
}

pub(crate) struct CreateExam<'a> {
    pub id: &'a str,
    pub title: &'a str,
    pub definition: serde_json::Value,
    pub is_active: bool,
    pub now: PrimitiveDateTime,
}

pub(crate) async fn create(pool: &PgPool, params: CreateExam<'_>) -> Result<ExamRecord, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "INSERT INTO exams (id, title, definition, is_active, created_at, updated_at)
         VALUES ($1,$2,$3,$4,$5,$5)
         RETURNING {COLUMNS}"
    ))
    .bind(params.id)
    .bind(params.title)
    .bind(Json(params.definition))
    .bind(params.is_active)
    .bind(params.now)
    .fetch_one(pool)
    .await
}
