use axum::{extract::State, routing::post, Json, Router};

use crate::api::errors::ApiError;
use crate::api::validation::validate_payload;
use crate::core::security;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::auth::{CandidateSummary, LoginRequest, LoginResponse};

const INVALID_CREDENTIALS: &str = "Invalid Candidate ID or password";

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    validate_payload(&payload)?;
    let candidate_id = payload.candidate_id.trim();

    let candidate = repositories::candidates::find_by_id(state.db(), candidate_id)
        .await
        .map_err(|e| ApiError::internal(e, "Failed to load candidate"))?
        .ok_or(ApiError::Unauthorized(INVALID_CREDENTIALS))?;

    let verified = security::verify_password(&payload.password, &candidate.hashed_password)
        .map_err(|_| ApiError::Unauthorized(INVALID_CREDENTIALS))?;
    if !verified {
        tracing::warn!(candidate_id, "Rejected login");
        return Err(ApiError::Unauthorized(INVALID_CREDENTIALS));
    }

    let token = security::create_access_token(
        &candidate.candidate_id,
        candidate.role,
        state.settings(),
        None,
    )
    .map_err(|e| ApiError::internal(e, "Failed to create access token"))?;

    tracing::info!(candidate_id = %candidate.candidate_id, "Candidate logged in");

    Ok(Json(LoginResponse {
        access_token: token,
        token_type: "bearer".to_string(),
        candidate: CandidateSummary::from_db(&candidate),
    }))
}
