use axum::Json;
use serde_json::{Value, json};

use crate::api::v1::extractors::Auth;
use crate::api::v1::policy::require;
use crate::error::AppError;
use crate::services::auth::identity::Role;

pub async fn user_dashboard(Auth(outcome): Auth) -> Result<Json<Value>, AppError> {
    let ctx = require(&outcome, &[Role::User, Role::Admin])?;
    Ok(Json(json!({
        "dashboard": "user",
        "username": ctx.username,
        "roles": ctx.roles,
        "expires_at": ctx.expires_at,
    })))
}

pub async fn admin_dashboard(Auth(outcome): Auth) -> Result<Json<Value>, AppError> {
    let ctx = require(&outcome, &[Role::Admin])?;
    tracing::info!(user = %ctx.username, remote_addr = ?ctx.remote_addr, "admin dashboard opened");
    Ok(Json(json!({
        "dashboard": "admin",
        "username": ctx.username,
        "roles": ctx.roles,
        "expires_at": ctx.expires_at,
    })))
}
