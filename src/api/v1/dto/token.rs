use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Request body for `POST /auth/token`.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub username: String,
}

impl TokenRequest {
    pub fn validate(&self) -> Result<&str, AppError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(AppError::bad_request(
                "VALIDATION_ERROR",
                "username must not be empty",
            ));
        }
        Ok(username)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: &'static str,
    /// Seconds until expiry.
    pub expires_in: u64,
    pub username: String,
    pub roles: Vec<String>,
}

/// Request body for `POST /auth/validate-token`.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidateTokenRequest {
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
    pub expired: bool,
    pub username: String,
    pub roles: Vec<String>,
}
