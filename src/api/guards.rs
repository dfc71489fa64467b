use async_trait::async_trait;
use axum::extract::{FromRequestParts, State};
use axum::http::{header, request::Parts};

use crate::api::errors::ApiError;
use crate::core::security::{self, Claims};
use crate::core::state::AppState;
use crate::db::types::CandidateRole;

/// Verified bearer token. Tokens are self-contained, so no database lookup happens here.
pub(crate) struct CurrentCandidate(pub(crate) Claims);
pub(crate) struct CurrentAdmin(pub(crate) Claims);

#[async_trait]
impl FromRequestParts<AppState> for CurrentCandidate {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let State(app_state) = State::<AppState>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::internal(e, "Failed to access application state"))?;

        let token = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .ok_or(ApiError::Unauthorized("Invalid authentication credentials"))?;

        let claims = security::verify_token(token, app_state.settings())
            .map_err(|_| ApiError::Unauthorized("Invalid authentication credentials"))?;

        Ok(CurrentCandidate(claims))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for CurrentAdmin {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let CurrentCandidate(claims) = CurrentCandidate::from_request_parts(parts, state).await?;

        if claims.role == CandidateRole::Admin {
            Ok(CurrentAdmin(claims))
        } else {
            Err(ApiError::Forbidden("Admin access required"))
        }
    }
}
