pub mod auth_ctx;

pub use auth_ctx::{Auth, AuthOutcome, CurrentUser, SecurityContext, UnauthenticatedReason};
