use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::error::AppError;

use super::{AuthOutcome, SecurityContext};

/// Handler-side view of the bearer middleware's outcome.
/// Never rejects; a request that skipped the middleware counts as unauthenticated.
pub struct Auth(pub AuthOutcome);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Auth(
            parts
                .extensions
                .get::<AuthOutcome>()
                .cloned()
                .unwrap_or_default(),
        ))
    }
}

/// Requires an authenticated request; 401 otherwise.
pub struct CurrentUser(pub SecurityContext);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthOutcome>() {
            Some(AuthOutcome::Authenticated(ctx)) => Ok(CurrentUser(ctx.clone())),
            _ => Err(AppError::Unauthorized),
        }
    }
}
