/*
 * Responsibility
 * - v1 URL layout
 * - Guards live in the handlers (policy::require); the bearer middleware is
 *   applied to the whole tree in app.rs
 */
use axum::{
    Router,
    routing::{get, post},
};

use crate::api::v1::handlers::{
    auth::{issue_token, validate_token},
    dashboard::{admin_dashboard, user_dashboard},
    health::health,
    test_routes,
};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/auth/token", post(issue_token))
        .route("/auth/validate-token", post(validate_token))
        .route("/test/public", get(test_routes::public))
        .route("/test/authenticated", get(test_routes::authenticated))
        .route("/test/user-only", get(test_routes::user_only))
        .route("/test/admin-only", get(test_routes::admin_only))
        .route("/test/user-or-admin", get(test_routes::user_or_admin))
        .route("/user/dashboard", get(user_dashboard))
        .route("/admin/dashboard", get(admin_dashboard))
}
