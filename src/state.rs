/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - tokens: TokenCodec, identities: IdentityLookup, authenticator: bearer middleware core
 * - Cloned per request, so every field is an Arc or Copy
 */
use std::sync::Arc;

use crate::config::AppEnv;
use crate::middleware::auth::bearer::Authenticator;
use crate::services::auth::{identity::IdentityLookup, token_codec::TokenCodec};

#[derive(Clone)]
pub struct AppState {
    pub app_env: AppEnv,
    pub tokens: Arc<TokenCodec>,
    pub identities: Arc<dyn IdentityLookup>,
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    pub fn new(
        app_env: AppEnv,
        tokens: Arc<TokenCodec>,
        identities: Arc<dyn IdentityLookup>,
        authenticator: Arc<Authenticator>,
    ) -> Self {
        Self {
            app_env,
            tokens,
            identities,
            authenticator,
        }
    }
}
