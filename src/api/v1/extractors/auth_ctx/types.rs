/*
 * Responsibility
 * - Request-scoped authentication result that handlers see
 * - The bearer middleware builds it and stores it in request extensions;
 *   handlers only receive these types
 *
 * Notes
 * - Token decoding and identity lookup live in middleware/services
 * - Authorization decisions are made by api::v1::policy on top of these types
 */
use std::collections::BTreeSet;
use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::services::auth::identity::{Identity, Role};
use crate::services::auth::token_codec::TokenError;

/// Resolved identity of an authenticated request.
///
/// - `roles` come from the identity directory, never from the token alone
/// - `remote_addr` is kept for audit logs (present when the server exposes ConnectInfo)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityContext {
    pub username: String,
    pub roles: BTreeSet<Role>,
    pub expires_at: Option<DateTime<Utc>>,
    pub remote_addr: Option<SocketAddr>,
}

impl SecurityContext {
    pub fn new(
        identity: Identity,
        expires_at: Option<DateTime<Utc>>,
        remote_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            username: identity.username,
            roles: identity.roles,
            expires_at,
            remote_addr,
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_any_role(&self, roles: &[Role]) -> bool {
        roles.iter().any(|r| self.has_role(*r))
    }
}

/// Why a request ended up unauthenticated. Logged, never sent to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnauthenticatedReason {
    NoCredentials,
    NotBearer,
    InvalidToken(TokenError),
    UnknownIdentity,
    LookupFailed,
    SubjectMismatch,
    Internal,
}

impl UnauthenticatedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredentials => "no_credentials",
            Self::NotBearer => "not_bearer",
            Self::InvalidToken(e) => e.kind(),
            Self::UnknownIdentity => "unknown_identity",
            Self::LookupFailed => "lookup_failed",
            Self::SubjectMismatch => "subject_mismatch",
            Self::Internal => "internal",
        }
    }
}

/// Result of the bearer middleware for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(SecurityContext),
    Unauthenticated(UnauthenticatedReason),
}

impl AuthOutcome {
    pub fn context(&self) -> Option<&SecurityContext> {
        match self {
            AuthOutcome::Authenticated(ctx) => Some(ctx),
            AuthOutcome::Unauthenticated(_) => None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.context().is_some()
    }
}

impl Default for AuthOutcome {
    fn default() -> Self {
        AuthOutcome::Unauthenticated(UnauthenticatedReason::NoCredentials)
    }
}
