pub mod auth;
pub mod dashboard;
pub mod health;
pub mod test_routes;
