use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentCandidate};
use crate::api::validation::validate_payload;
use crate::core::metrics::RESULTS_SUBMISSIONS_TOTAL;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::repositories;
use crate::schemas::result::{ResultResponse, SubmitRequest, SubmitResponse};
use crate::services::result_merge;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/submit", post(submit))
        .route("/results", get(list_results))
        .route("/results/:candidate_id", get(get_result))
}

async fn submit(
    State(state): State<AppState>,
    CurrentCandidate(claims): CurrentCandidate,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    validate_payload(&payload)?;
    if payload.candidate_id != claims.sub {
        return Err(ApiError::Forbidden("Cannot submit for another candidate"));
    }

    let raw = serde_json::to_value(&payload)
        .map_err(|e| ApiError::internal(e, "Failed to encode submission"))?;
    let now = primitive_now_utc();

    let mut tx = state
        .db()
        .begin()
        .await
        .map_err(|e| ApiError::internal(e, "Failed to start transaction"))?;

    repositories::results::lock_candidate(&mut *tx, &payload.candidate_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to lock result"))?;
    let existing = repositories::results::find(&mut *tx, &payload.candidate_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load result"))?;

    let merged = result_merge::merge(existing, &payload, now);
    let saved = repositories::results::upsert(&mut *tx, &merged)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to save result"))?;
    repositories::results::append_log(&mut *tx, &payload.candidate_id, &payload.section, raw, now)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to record submission"))?;

    tx.commit().await.map_err(|e| ApiError::internal(e, "Failed to commit submission"))?;

    metrics::counter!(
        RESULTS_SUBMISSIONS_TOTAL,
        "disqualified" => saved.disqualified.to_string()
    )
    .increment(1);
    tracing::info!(
        candidate_id = %saved.candidate_id,
        section = %payload.section,
        total_score = saved.total_score,
        warning_count = saved.warning_count,
        disqualified = saved.disqualified,
        "Submission merged"
    );

    Ok(Json(SubmitResponse {
        message: "Submission saved".to_string(),
        total_score: saved.total_score,
        sections_completed: saved.sections_completed.0,
    }))
}

async fn list_results(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
) -> Result<Json<Vec<ResultResponse>>, ApiError> {
    let records = repositories::results::list_ranked(state.db())
        .await
        .map_err(|e| ApiError::internal(e, "Failed to list results"))?;

    Ok(Json(records.into_iter().map(ResultResponse::from_db).collect()))
}

async fn get_result(
    State(state): State<AppState>,
    CurrentAdmin(_admin): CurrentAdmin,
    Path(candidate_id): Path<String>,
) -> Result<Json<ResultResponse>, ApiError> {
    let record = repositories::results::find(state.db(), &candidate_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    Ok(Json(ResultResponse::from_db(record)))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;
    use tower::ServiceExt;

    use crate::db::types::CandidateRole;
    use crate::test_support::{bearer_token, json_request, read_json, test_app};

    #[tokio::test]
    async fn submit_requires_bearer_token() {
        let ctx = test_app().await;

        let response = ctx
            .app
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submit",
                None,
                Some(json!({"candidate_id": "CAND-1", "section": "A"})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn submit_rejects_empty_section() {
        let ctx = test_app().await;
        let token = bearer_token("CAND-1", CandidateRole::Candidate, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submit",
                Some(&token),
                Some(json!({"candidateId": "CAND-1", "section": ""})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = read_json(response).await;
        assert_eq!(body["detail"], "section is required");
    }

    #[tokio::test]
    async fn submit_for_another_candidate_is_forbidden() {
        let ctx = test_app().await;
        let token = bearer_token("CAND-1", CandidateRole::Candidate, ctx.state.settings());

        let response = ctx
            .app
            .oneshot(json_request(
                Method::POST,
                "/api/v1/submit",
                Some(&token),
                Some(json!({"candidate_id": "CAND-2", "section": "A", "score": 3})),
            ))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn results_require_admin_role() {
        let ctx = test_app().await;
        let token = bearer_token("CAND-1", CandidateRole::Candidate, ctx.state.settings());

        let list = ctx
            .app
            .clone()
            .oneshot(json_request(Method::GET, "/api/v1/results", Some(&token), None))
            .await
            .expect("response");
        assert_eq!(list.status(), StatusCode::FORBIDDEN);

        let single = ctx
            .app
            .oneshot(json_request(Method::GET, "/api/v1/results/CAND-1", None, None))
            .await
            .expect("response");
        assert_eq!(single.status(), StatusCode::UNAUTHORIZED);
    }
}
