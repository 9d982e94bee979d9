//! Bearer token authentication → `AuthOutcome` in request extensions.
//!
//! The middleware never rejects. It decides whether the request carries a
//! trusted identity and always hands the request on; guards in the handlers
//! turn an `Unauthenticated` outcome into 401/403.
//!
//! Per request:
//! - context already populated upstream → left as is, whatever the header says
//! - no `Authorization` header, or not `Bearer <token>` → unauthenticated
//! - token fails verification (any `TokenError`) → unauthenticated
//! - subject unknown / lookup error / lookup timeout → unauthenticated
//! - `is_valid_for(token, identity)` false → unauthenticated
//! - otherwise → `Authenticated(SecurityContext)`

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderValue, Request, header},
    middleware::{self, Next},
    response::Response,
};
use futures::FutureExt;
use tracing::{debug, error};

use crate::api::v1::extractors::{AuthOutcome, SecurityContext, UnauthenticatedReason};
use crate::services::auth::identity::{IdentityLookup, LookupError};
use crate::services::auth::token_codec::TokenCodec;
use crate::state::AppState;

/// Case-sensitive, exactly one space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Apply bearer authentication to every route of `router`.
///
/// ```ignore
/// let v1 = api::v1::routes();
/// let v1 = middleware::auth::bearer::apply(v1, state.clone());
/// app = app.nest("/api/v1", v1);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, bearer_middleware))
}

/// Decision logic of the middleware, free of axum plumbing.
pub struct Authenticator {
    codec: Arc<TokenCodec>,
    lookup: Arc<dyn IdentityLookup>,
    lookup_timeout: Duration,
}

impl Authenticator {
    pub fn new(
        codec: Arc<TokenCodec>,
        lookup: Arc<dyn IdentityLookup>,
        lookup_timeout: Duration,
    ) -> Self {
        Self {
            codec,
            lookup,
            lookup_timeout,
        }
    }

    /// Returns `None` when the request already carries an authenticated
    /// context that must be kept; otherwise the outcome to store.
    pub async fn authenticate(
        &self,
        authorization: Option<&HeaderValue>,
        already_authenticated: bool,
        remote_addr: Option<SocketAddr>,
    ) -> Option<AuthOutcome> {
        if already_authenticated {
            debug!("security context already populated");
            return None;
        }

        let Some(value) = authorization else {
            return Some(unauthenticated(UnauthenticatedReason::NoCredentials));
        };

        let Some(token) = value
            .to_str()
            .ok()
            .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        else {
            debug!("authorization header is not a bearer credential");
            return Some(unauthenticated(UnauthenticatedReason::NotBearer));
        };

        // Same checks as `extract_subject`; the claims are kept for the expiry.
        let claims = match self.codec.verify(token) {
            Ok(claims) => claims,
            Err(err) => {
                debug!(reason = err.kind(), error = %err, "bearer token rejected");
                return Some(unauthenticated(UnauthenticatedReason::InvalidToken(err)));
            }
        };

        let identity =
            match tokio::time::timeout(self.lookup_timeout, self.lookup.lookup(&claims.sub)).await
            {
                Ok(Ok(identity)) => identity,
                Ok(Err(LookupError::NotFound)) => {
                    debug!(subject = %claims.sub, "token subject not found");
                    return Some(unauthenticated(UnauthenticatedReason::UnknownIdentity));
                }
                Ok(Err(err)) => {
                    debug!(subject = %claims.sub, error = %err, "identity lookup failed");
                    return Some(unauthenticated(UnauthenticatedReason::LookupFailed));
                }
                Err(_) => {
                    debug!(
                        subject = %claims.sub,
                        timeout = ?self.lookup_timeout,
                        "identity lookup timed out"
                    );
                    return Some(unauthenticated(UnauthenticatedReason::LookupFailed));
                }
            };

        if !self.codec.is_valid_for(token, &identity.username) {
            debug!(subject = %claims.sub, "token is not valid for resolved identity");
            return Some(unauthenticated(UnauthenticatedReason::SubjectMismatch));
        }

        debug!(user = %identity.username, remote_addr = ?remote_addr, "authenticated");
        Some(AuthOutcome::Authenticated(SecurityContext::new(
            identity,
            claims.expires_at(),
            remote_addr,
        )))
    }
}

fn unauthenticated(reason: UnauthenticatedReason) -> AuthOutcome {
    AuthOutcome::Unauthenticated(reason)
}

async fn bearer_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let authorization = req.headers().get(header::AUTHORIZATION).cloned();
    let remote_addr = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let already_authenticated = req
        .extensions()
        .get::<AuthOutcome>()
        .is_some_and(AuthOutcome::is_authenticated);

    let attempt =
        state
            .authenticator
            .authenticate(authorization.as_ref(), already_authenticated, remote_addr);

    // A panicking lookup must not take the request down with it.
    let resolved = match AssertUnwindSafe(attempt).catch_unwind().await {
        Ok(resolved) => resolved,
        Err(_) => {
            error!("authentication step panicked; continuing unauthenticated");
            (!already_authenticated)
                .then(|| unauthenticated(UnauthenticatedReason::Internal))
        }
    };

    if let Some(outcome) = resolved {
        req.extensions_mut().insert(outcome);
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use std::{future::Future, pin::Pin};

    use axum::{
        extract::Request as AxumRequest,
        http::StatusCode,
        routing::get,
    };
    use chrono::Duration as ChronoDuration;
    use serde_json::{Map, json};
    use tower::ServiceExt;

    use super::*;
    use crate::api::v1::extractors::Auth;
    use crate::config::AppEnv;
    use crate::services::auth::clock::ManualClock;
    use crate::services::auth::identity::{Identity, Role};
    use crate::services::auth::token_codec::TokenError;
    use crate::state::test_support;

    struct FailingLookup;

    impl IdentityLookup for FailingLookup {
        fn lookup<'a>(
            &'a self,
            _subject: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Identity, LookupError>> + Send + 'a>> {
            Box::pin(async { Err(LookupError::Unavailable("directory offline".into())) })
        }
    }

    struct SlowLookup;

    impl IdentityLookup for SlowLookup {
        fn lookup<'a>(
            &'a self,
            subject: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Identity, LookupError>> + Send + 'a>> {
            Box::pin(async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(Identity::new(subject, [Role::User]))
            })
        }
    }

    struct PanickingLookup;

    impl IdentityLookup for PanickingLookup {
        fn lookup<'a>(
            &'a self,
            subject: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Identity, LookupError>> + Send + 'a>> {
            Box::pin(async move {
                if subject.is_empty() {
                    return Err(LookupError::NotFound);
                }
                panic!("directory exploded")
            })
        }
    }

    /// Maps subjects to a different username, so the final subject check fails.
    struct RenamingLookup;

    impl IdentityLookup for RenamingLookup {
        fn lookup<'a>(
            &'a self,
            subject: &'a str,
        ) -> Pin<Box<dyn Future<Output = Result<Identity, LookupError>> + Send + 'a>> {
            Box::pin(async move { Ok(Identity::new(format!("{subject}-renamed"), [Role::User])) })
        }
    }

    fn bearer(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {token}")).unwrap()
    }

    fn token_for(state: &AppState, subject: &str) -> String {
        state
            .tokens
            .issue(subject, Map::new(), Duration::from_secs(3600))
            .unwrap()
    }

    async fn run(state: &AppState, header: Option<HeaderValue>) -> AuthOutcome {
        state
            .authenticator
            .authenticate(header.as_ref(), false, None)
            .await
            .expect("outcome")
    }

    // Reports what the middleware stored; reaching it at all proves pass-through.
    async fn probe(Auth(outcome): Auth) -> String {
        match outcome {
            AuthOutcome::Authenticated(ctx) => format!("user:{}", ctx.username),
            AuthOutcome::Unauthenticated(reason) => format!("anon:{}", reason.as_str()),
        }
    }

    fn probe_router(state: AppState) -> Router {
        apply(Router::new().route("/probe", get(probe)), state.clone()).with_state(state)
    }

    async fn call(router: Router, req: AxumRequest) -> (StatusCode, String) {
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn get_probe(authorization: Option<&str>) -> AxumRequest {
        let mut builder = Request::builder().uri("/probe");
        if let Some(v) = authorization {
            builder = builder.header(header::AUTHORIZATION, v);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn valid_token_for_known_user_authenticates() {
        let (state, _) = test_support::state();
        let token = token_for(&state, "root");

        let outcome = run(&state, Some(bearer(&token))).await;
        let ctx = outcome.context().expect("authenticated");
        assert_eq!(ctx.username, "root");
        assert!(ctx.has_role(Role::Admin));
        assert_eq!(
            ctx.expires_at,
            Some(test_support::epoch() + ChronoDuration::hours(1))
        );
    }

    #[tokio::test]
    async fn missing_header_is_unauthenticated() {
        let (state, _) = test_support::state();
        assert_eq!(
            run(&state, None).await,
            AuthOutcome::Unauthenticated(UnauthenticatedReason::NoCredentials)
        );
    }

    #[tokio::test]
    async fn non_bearer_schemes_are_unauthenticated() {
        let (state, _) = test_support::state();
        let token = token_for(&state, "alice");

        for value in [
            format!("Basic {token}"),
            format!("bearer {token}"),
            format!("Bearer  {token}"),
            format!("Bearer{token}"),
        ] {
            let outcome = run(&state, Some(HeaderValue::from_str(&value).unwrap())).await;
            assert!(!outcome.is_authenticated(), "{value}");
        }
        assert_eq!(
            run(&state, Some(HeaderValue::from_static("Basic abc"))).await,
            AuthOutcome::Unauthenticated(UnauthenticatedReason::NotBearer)
        );
    }

    #[tokio::test]
    async fn malformed_token_is_unauthenticated() {
        let (state, _) = test_support::state();
        assert_eq!(
            run(&state, Some(bearer("not-a-token"))).await,
            AuthOutcome::Unauthenticated(UnauthenticatedReason::InvalidToken(
                TokenError::MalformedToken
            ))
        );
    }

    #[tokio::test]
    async fn expired_token_is_unauthenticated() {
        let (state, clock) = test_support::state();
        let token = token_for(&state, "alice");
        clock.advance(ChronoDuration::hours(2));

        assert_eq!(
            run(&state, Some(bearer(&token))).await,
            AuthOutcome::Unauthenticated(UnauthenticatedReason::InvalidToken(
                TokenError::TokenExpired
            ))
        );
    }

    #[tokio::test]
    async fn unknown_subject_is_unauthenticated() {
        let (state, _) = test_support::state();
        let token = token_for(&state, "mallory");
        assert_eq!(
            run(&state, Some(bearer(&token))).await,
            AuthOutcome::Unauthenticated(UnauthenticatedReason::UnknownIdentity)
        );
    }

    #[tokio::test]
    async fn lookup_failure_and_timeout_are_unauthenticated() {
        let clock = Arc::new(ManualClock::new(test_support::epoch()));
        for lookup in [
            Arc::new(FailingLookup) as Arc<dyn IdentityLookup>,
            Arc::new(SlowLookup) as Arc<dyn IdentityLookup>,
        ] {
            let state = test_support::state_with(clock.clone(), lookup, AppEnv::Development);
            let token = token_for(&state, "alice");
            assert_eq!(
                run(&state, Some(bearer(&token))).await,
                AuthOutcome::Unauthenticated(UnauthenticatedReason::LookupFailed)
            );
        }
    }

    #[tokio::test]
    async fn identity_with_other_username_fails_final_check() {
        let clock = Arc::new(ManualClock::new(test_support::epoch()));
        let state =
            test_support::state_with(clock, Arc::new(RenamingLookup), AppEnv::Development);
        let token = token_for(&state, "alice");

        assert_eq!(
            run(&state, Some(bearer(&token))).await,
            AuthOutcome::Unauthenticated(UnauthenticatedReason::SubjectMismatch)
        );
    }

    #[tokio::test]
    async fn already_authenticated_request_is_left_alone() {
        let (state, _) = test_support::state();
        let token = token_for(&state, "alice");
        let outcome = state
            .authenticator
            .authenticate(Some(&bearer(&token)), true, None)
            .await;
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn middleware_forwards_every_request() {
        let (state, clock) = test_support::state();
        let alice = token_for(&state, "alice");
        let mallory = token_for(&state, "mallory");
        let expiring = token_for(&state, "root");

        let cases = [
            (None, "anon:no_credentials"),
            (Some("Token abc".to_string()), "anon:not_bearer"),
            (Some("Bearer a.b".to_string()), "anon:malformed_token"),
            (Some(format!("Bearer {mallory}")), "anon:unknown_identity"),
            (Some(format!("Bearer {alice}")), "user:alice"),
        ];
        for (header, expected) in cases {
            let (status, body) = call(probe_router(state.clone()), get_probe(header.as_deref())).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, expected);
        }

        clock.advance(ChronoDuration::hours(1));
        let (status, body) = call(
            probe_router(state.clone()),
            get_probe(Some(format!("Bearer {expiring}").as_str())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anon:token_expired");
    }

    #[tokio::test]
    async fn middleware_keeps_upstream_context() {
        let (state, _) = test_support::state();
        let token = token_for(&state, "alice");

        async fn seed(mut req: AxumRequest, next: Next) -> Response {
            let upstream = SecurityContext::new(Identity::new("upstream", [Role::Admin]), None, None);
            req.extensions_mut()
                .insert(AuthOutcome::Authenticated(upstream));
            next.run(req).await
        }

        let router = probe_router(state).layer(middleware::from_fn(seed));
        let (_, body) = call(router, get_probe(Some(format!("Bearer {token}").as_str()))).await;
        assert_eq!(body, "user:upstream");
    }

    #[tokio::test]
    async fn upstream_context_survives_rejected_credentials() {
        let (state, _) = test_support::state();

        async fn seed(mut req: AxumRequest, next: Next) -> Response {
            let upstream = SecurityContext::new(Identity::new("upstream", [Role::User]), None, None);
            req.extensions_mut()
                .insert(AuthOutcome::Authenticated(upstream));
            next.run(req).await
        }

        for header in [None, Some("Basic abc"), Some("Bearer garbage")] {
            let router = probe_router(state.clone()).layer(middleware::from_fn(seed));
            let (status, body) = call(router, get_probe(header)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body, "user:upstream", "{header:?}");
        }
    }

    #[tokio::test]
    async fn already_authenticated_skips_every_check() {
        let (state, _) = test_support::state();
        for header in [None, Some(HeaderValue::from_static("Basic abc")), Some(bearer("a.b"))] {
            let outcome = state
                .authenticator
                .authenticate(header.as_ref(), true, None)
                .await;
            assert!(outcome.is_none(), "{header:?}");
        }
    }

    #[tokio::test]
    async fn middleware_survives_panicking_lookup() {
        let clock = Arc::new(ManualClock::new(test_support::epoch()));
        let state =
            test_support::state_with(clock, Arc::new(PanickingLookup), AppEnv::Development);
        let token = token_for(&state, "alice");

        let (status, body) = call(
            probe_router(state),
            get_probe(Some(format!("Bearer {token}").as_str())),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "anon:internal");
    }

    #[tokio::test]
    async fn middleware_records_remote_address() {
        let (state, _) = test_support::state();
        let token = token_for(&state, "alice");
        let addr: SocketAddr = "203.0.113.9:4711".parse().unwrap();

        async fn remote(Auth(outcome): Auth) -> String {
            outcome
                .context()
                .and_then(|ctx| ctx.remote_addr)
                .map(|a| a.to_string())
                .unwrap_or_default()
        }
        let router = apply(Router::new().route("/probe", get(remote)), state.clone())
            .with_state(state);

        let mut req = get_probe(Some(format!("Bearer {token}").as_str()));
        req.extensions_mut().insert(ConnectInfo(addr));
        let (_, body) = call(router, req).await;
        assert_eq!(body, "203.0.113.9:4711");
    }

    #[tokio::test]
    async fn roles_come_from_directory_not_token() {
        let (state, _) = test_support::state();
        let mut claims = Map::new();
        claims.insert("roles".into(), json!(["ADMIN"]));
        let token = state
            .tokens
            .issue("alice", claims, Duration::from_secs(60))
            .unwrap();

        let outcome = run(&state, Some(bearer(&token))).await;
        let ctx = outcome.context().unwrap();
        assert!(ctx.has_role(Role::User));
        assert!(!ctx.has_role(Role::Admin));
    }
}
