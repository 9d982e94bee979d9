/// Factory: build the token codec and the bearer authenticator from `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::middleware::auth::bearer::Authenticator;
use crate::services::auth::clock::SystemClock;
use crate::services::auth::identity::IdentityLookup;
use crate::services::auth::token_codec::TokenCodec;

pub fn build_token_codec(config: &Config) -> Arc<TokenCodec> {
    Arc::new(TokenCodec::new(
        config.signing_key.clone(),
        Arc::new(SystemClock),
        config.access_token_ttl,
    ))
}

pub fn build_authenticator(
    config: &Config,
    tokens: Arc<TokenCodec>,
    identities: Arc<dyn IdentityLookup>,
) -> Arc<Authenticator> {
    Arc::new(Authenticator::new(
        tokens,
        identities,
        config.identity_lookup_timeout,
    ))
}
