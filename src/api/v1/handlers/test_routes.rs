/*
 * Responsibility
 * - GET /test routes: one route per guard shape
 */
use axum::Json;
use serde_json::{Value, json};

use crate::api::v1::extractors::{Auth, CurrentUser};
use crate::api::v1::policy::require;
use crate::error::AppError;
use crate::services::auth::identity::Role;

pub async fn public() -> Json<Value> {
    Json(json!({ "message": "public endpoint" }))
}

pub async fn authenticated(CurrentUser(ctx): CurrentUser) -> Json<Value> {
    Json(json!({
        "message": "authenticated endpoint",
        "username": ctx.username,
        "roles": ctx.roles,
    }))
}

pub async fn user_only(Auth(outcome): Auth) -> Result<Json<Value>, AppError> {
    let ctx = require(&outcome, &[Role::User])?;
    Ok(Json(json!({ "message": "user endpoint", "username": ctx.username })))
}

pub async fn admin_only(Auth(outcome): Auth) -> Result<Json<Value>, AppError> {
    let ctx = require(&outcome, &[Role::Admin])?;
    Ok(Json(json!({ "message": "admin endpoint", "username": ctx.username })))
}

pub async fn user_or_admin(Auth(outcome): Auth) -> Result<Json<Value>, AppError> {
    let ctx = require(&outcome, &[Role::User, Role::Admin])?;
    Ok(Json(json!({
        "message": "user or admin endpoint",
        "username": ctx.username,
        "roles": ctx.roles,
    })))
}
