/*
 * Responsibility
 * - Config loading → dependency wiring → Router assembly
 * - Middleware order: bearer authentication inside, HTTP layer outside
 * - axum::serve() with ConnectInfo so the security context sees the peer address
 */
use std::net::SocketAddr;
use std::{panic, sync::Arc};

use anyhow::Result;
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, HttpPolicy};
use crate::middleware;
use crate::services::auth::{IdentityLookup, build_authenticator, build_token_codec};
use crate::api;
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins, e.g. RUST_LOG=info,tokengate=debug,tower_http=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook() {
    let default_hook = panic::take_hook();

    // Report through tracing, then keep the default stderr output. No abort:
    // the bearer middleware recovers from panics inside identity lookups.
    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");
        default_hook(info);
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();

    let config = Config::from_env().inspect_err(|e| {
        tracing::error!(error = %e, "refusing to start");
    })?;

    init_panic_hook();

    tracing::info!(
        env = ?config.app_env,
        addr = %config.addr,
        users = config.users.len(),
        token_ttl_secs = config.access_token_ttl.as_secs(),
        "starting tokengate"
    );

    let state = build_state(&config);
    let app = build_router(state, config.http);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

fn build_state(config: &Config) -> AppState {
    let tokens = build_token_codec(config);
    let identities: Arc<dyn IdentityLookup> = Arc::new(config.users.clone());
    let authenticator = build_authenticator(config, tokens.clone(), identities.clone());

    AppState::new(config.app_env, tokens, identities, authenticator)
}

pub(crate) fn build_router(state: AppState, http: HttpPolicy) -> Router {
    let v1 = middleware::auth::bearer::apply(api::v1::routes(), state.clone());

    let router = Router::new().nest("/api/v1", v1).with_state(state);

    middleware::http::apply(router, http)
}
