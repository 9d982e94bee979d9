/*
 * Responsibility
 * - Load settings from the environment (.env via dotenvy)
 * - Validate them up front: a missing or weak signing secret stops startup
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::services::auth::identity::IdentityDirectory;
use crate::services::auth::signing_key::SigningKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(value: Option<&str>) -> Self {
        match value
            .unwrap_or("development")
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Transport-level limits applied by `middleware::http`.
#[derive(Debug, Clone, Copy)]
pub struct HttpPolicy {
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for HttpPolicy {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            body_limit_bytes: 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // HS256 secret (JWT_SECRET, standard base64)
    pub signing_key: SigningKey,
    pub access_token_ttl: Duration,
    pub identity_lookup_timeout: Duration,

    // Seed for the in-memory identity directory (AUTH_USERS)
    pub users: IdentityDirectory,

    pub http: HttpPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source. `from_env` passes the process environment.
    pub fn from_source<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = var("PORT").and_then(|s| s.parse().ok()).unwrap_or(3000);

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(var("APP_ENV").as_deref());

        let secret = var("JWT_SECRET")
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let signing_key = SigningKey::from_base64(&secret).map_err(|e| {
            tracing::error!(reason = %e, "JWT_SECRET rejected");
            ConfigError::Invalid("JWT_SECRET")
        })?;

        let access_token_ttl_seconds: u64 = match var("ACCESS_TOKEN_TTL_SECONDS") {
            Some(v) => v
                .parse()
                .map_err(|_| ConfigError::Invalid("ACCESS_TOKEN_TTL_SECONDS"))?,
            None => 3600, // 1 hour
        };

        let identity_lookup_timeout_ms: u64 = var("IDENTITY_LOOKUP_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or(2000);

        let users = IdentityDirectory::parse(&var("AUTH_USERS").unwrap_or_default())
            .map_err(|e| {
                tracing::error!(reason = %e, "AUTH_USERS rejected");
                ConfigError::Invalid("AUTH_USERS")
            })?;

        let defaults = HttpPolicy::default();
        let http = HttpPolicy {
            request_timeout: var("HTTP_REQUEST_TIMEOUT_SECONDS")
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            body_limit_bytes: var("HTTP_BODY_LIMIT_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.body_limit_bytes),
        };

        Ok(Self {
            addr,
            app_env,
            signing_key,
            access_token_ttl: Duration::from_secs(access_token_ttl_seconds),
            identity_lookup_timeout: Duration::from_millis(identity_lookup_timeout_ms),
            users,
            http,
        })
    }
}
