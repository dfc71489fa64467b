use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;

use crate::api::errors::ApiError;
use crate::core::state::AppState;
use crate::repositories;

pub(crate) const ACTIVE_EXAM_CACHE_KEY: &str = "exam:active";

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/active", get(active_exam))
}

async fn active_exam(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    match state.redis().cached(ACTIVE_EXAM_CACHE_KEY).await {
        Ok(Some(raw)) => match serde_json::from_str::<Value>(&raw) {
            Ok(definition) => return Ok(Json(definition)),
            Err(err) => tracing::warn!(error = %err, "Discarding unreadable cached exam"),
        },
        Ok(None) => {}
        Err(err) => tracing::warn!(error = %err, "Active exam cache read failed"),
    }

    let record = repositories::exams::find_active(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load active exam"))?
        .ok_or_else(|| ApiError::NotFound("No active exam found".to_string()))?;

    let definition = record.definition.0;
    let ttl = state.settings().redis().active_exam_cache_seconds;
    if let Err(err) = state.redis().cache(ACTIVE_EXAM_CACHE_KEY, &definition.to_string(), ttl).await {
        tracing::warn!(error = %err, "Active exam cache write failed");
    }

    Ok(Json(definition))
}
