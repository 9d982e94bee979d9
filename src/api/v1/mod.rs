/*
 * Responsibility
 * - v1 surface: DTOs, extractors, handlers, route policy
 * - routes() is the only entry point used by app.rs
 */
pub mod dto;
pub mod extractors;
pub mod handlers;
pub mod policy;
mod routes;

pub use routes::routes;
