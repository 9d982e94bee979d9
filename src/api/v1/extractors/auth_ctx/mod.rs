/*!
 * Authentication context extractor
 *
 * Responsibility:
 * - Give handlers the request's authentication outcome (AuthOutcome / SecurityContext)
 * - axum-facing code lives in core, plain types in types
 *
 * Public API:
 * - AuthOutcome, SecurityContext, UnauthenticatedReason
 * - Auth, CurrentUser
 */

mod core;
mod types;

pub use self::core::{Auth, CurrentUser};
pub use types::{AuthOutcome, SecurityContext, UnauthenticatedReason};
