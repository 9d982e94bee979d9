//! Route-level authorization.
//!
//! Every guarded handler calls [`require`] with the roles it accepts. An empty
//! role list means "any authenticated caller"; otherwise holding any one of the
//! listed roles is enough.

use crate::api::v1::extractors::{AuthOutcome, SecurityContext};
use crate::error::AppError;
use crate::services::auth::identity::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Unauthenticated,
    Forbidden,
}

pub fn authorize(outcome: &AuthOutcome, required: &[Role]) -> Decision {
    match outcome.context() {
        None => Decision::Unauthenticated,
        Some(_) if required.is_empty() => Decision::Allow,
        Some(ctx) if ctx.has_any_role(required) => Decision::Allow,
        Some(_) => Decision::Forbidden,
    }
}

/// `authorize` mapped onto HTTP errors (401 / 403).
pub fn require<'a>(
    outcome: &'a AuthOutcome,
    required: &[Role],
) -> Result<&'a SecurityContext, AppError> {
    match (authorize(outcome, required), outcome.context()) {
        (Decision::Allow, Some(ctx)) => Ok(ctx),
        (Decision::Forbidden, _) => {
            tracing::debug!(required = ?required, "role check failed");
            Err(AppError::Forbidden)
        }
        _ => Err(AppError::Unauthorized),
    }
}
