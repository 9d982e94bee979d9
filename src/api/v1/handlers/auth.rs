/*
 * Responsibility
 * - POST /auth/token: issue a token for a known user (development only)
 * - POST /auth/validate-token: describe a token without trusting it
 */
use axum::{Json, extract::State};

use crate::api::v1::dto::token::{
    TokenRequest, TokenResponse, ValidateTokenRequest, ValidateTokenResponse,
};
use crate::error::AppError;
use crate::services::auth::identity::LookupError;
use crate::state::AppState;

pub async fn issue_token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    // Stand-in for a real login flow; not mounted in production.
    if state.app_env.is_production() {
        return Err(AppError::not_found("route"));
    }

    let username = req.validate()?;
    let identity = state
        .identities
        .lookup(username)
        .await
        .map_err(|e| match e {
            LookupError::NotFound => AppError::not_found("user"),
            LookupError::Unavailable(reason) => {
                tracing::error!(%reason, "identity lookup failed during token issue");
                AppError::Internal
            }
        })?;

    let access_token = state.tokens.issue_for(&identity)?;
    tracing::info!(user = %identity.username, "issued access token");

    Ok(Json(TokenResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.tokens.default_ttl().as_secs(),
        username: identity.username.clone(),
        roles: identity.role_names(),
    }))
}

pub async fn validate_token(
    State(state): State<AppState>,
    Json(req): Json<ValidateTokenRequest>,
) -> Result<Json<ValidateTokenResponse>, AppError> {
    let claims = state.tokens.verify_signature(req.token.trim())?;
    let expired = claims.is_expired_at(state.tokens.now());
    let roles = claims.roles()?;

    Ok(Json(ValidateTokenResponse {
        valid: !expired,
        expired,
        username: claims.sub,
        roles,
    }))
}
