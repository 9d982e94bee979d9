//! HS256 bearer token issuance and verification.
//!
//! Tokens are compact JWS strings (`header.payload.signature`). The codec owns
//! `sub`, `iat` and `exp`; every other claim handed to [`TokenCodec::issue`] is
//! carried verbatim.
//!
//! Verification order is fixed: structure, header algorithm, signature,
//! payload, claim shapes, expiry. Expiry is therefore never reported for a
//! token whose signature does not check out.

use std::{sync::Arc, time::Duration};

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::error;

use crate::services::auth::clock::Clock;
use crate::services::auth::identity::{Identity, Role};
use crate::services::auth::signing_key::SigningKey;

pub const ALGORITHM: &str = "HS256";

const CLAIM_SUB: &str = "sub";
const CLAIM_IAT: &str = "iat";
const CLAIM_EXP: &str = "exp";
const CLAIM_ROLES: &str = "roles";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is malformed")]
    MalformedToken,

    #[error("token signature is invalid")]
    InvalidSignature,

    #[error("token algorithm is not supported")]
    UnsupportedAlgorithm,

    #[error("token has expired")]
    TokenExpired,

    #[error("invalid '{0}' claim")]
    InvalidClaims(&'static str),

    #[error("failed to sign token")]
    Signing,
}

impl TokenError {
    /// Stable identifier for logs and API error codes.
    pub fn kind(&self) -> &'static str {
        match self {
            TokenError::MalformedToken => "malformed_token",
            TokenError::InvalidSignature => "invalid_signature",
            TokenError::UnsupportedAlgorithm => "unsupported_algorithm",
            TokenError::TokenExpired => "token_expired",
            TokenError::InvalidClaims(_) => "invalid_claims",
            TokenError::Signing => "signing_failed",
        }
    }
}

/// Verified (or about to be signed) claim set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Claims {
    pub sub: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    pub exp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Claims {
    pub fn subject(&self) -> &str {
        &self.sub
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.iat.and_then(|s| DateTime::from_timestamp(s, 0))
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.exp, 0)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// `roles` claim as issued. Absent or null is an empty list.
    pub fn roles(&self) -> Result<Vec<String>, TokenError> {
        match self.extra.get(CLAIM_ROLES) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or(TokenError::InvalidClaims(CLAIM_ROLES))
                })
                .collect(),
            Some(_) => Err(TokenError::InvalidClaims(CLAIM_ROLES)),
        }
    }

    /// Roles from the claim that match the trusted role set. Unknown names are dropped.
    pub fn trusted_roles(&self) -> Result<Vec<Role>, TokenError> {
        Ok(self.roles()?.iter().filter_map(|r| Role::parse(r)).collect())
    }

    /// Expired when `now >= exp`, compared at millisecond precision.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() >= self.exp.saturating_mul(1000)
    }

    fn from_payload(mut payload: Map<String, Value>) -> Result<Self, TokenError> {
        let sub = match payload.remove(CLAIM_SUB) {
            Some(Value::String(s)) if !s.trim().is_empty() => s,
            _ => return Err(TokenError::InvalidClaims(CLAIM_SUB)),
        };

        let exp = payload
            .remove(CLAIM_EXP)
            .as_ref()
            .and_then(Value::as_i64)
            .ok_or(TokenError::InvalidClaims(CLAIM_EXP))?;

        let iat = match payload.remove(CLAIM_IAT) {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_i64().ok_or(TokenError::InvalidClaims(CLAIM_IAT))?),
        };

        if iat.is_some_and(|iat| exp < iat) {
            return Err(TokenError::InvalidClaims(CLAIM_EXP));
        }

        Ok(Self {
            sub,
            iat,
            exp,
            extra: payload,
        })
    }
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Stateless HS256 codec. Safe to share behind `Arc` across request tasks.
#[derive(Clone)]
pub struct TokenCodec {
    key: SigningKey,
    clock: Arc<dyn Clock>,
    default_ttl: Duration,
    validation: Validation,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("key", &self.key)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(key: SigningKey, clock: Arc<dyn Clock>, default_ttl: Duration) -> Self {
        // Signature and algorithm only. Claim checks (including expiry) run
        // against our own clock in `verify`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key,
            clock,
            default_ttl,
            validation,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Sign `claims` for `subject`, valid for `ttl` (whole seconds).
    pub fn issue(
        &self,
        subject: &str,
        claims: Map<String, Value>,
        ttl: Duration,
    ) -> Result<String, TokenError> {
        if subject.trim().is_empty() {
            return Err(TokenError::InvalidClaims(CLAIM_SUB));
        }

        let ttl_secs =
            i64::try_from(ttl.as_secs()).map_err(|_| TokenError::InvalidClaims(CLAIM_EXP))?;
        let iat = self.clock.now().timestamp();
        let exp = iat
            .checked_add(ttl_secs)
            .ok_or(TokenError::InvalidClaims(CLAIM_EXP))?;

        let mut extra = claims;
        for reserved in [CLAIM_SUB, CLAIM_IAT, CLAIM_EXP] {
            extra.remove(reserved);
        }

        let claims = Claims {
            sub: subject.to_string(),
            iat: Some(iat),
            exp,
            extra,
        };

        let header = Header::new(Algorithm::HS256);
        jsonwebtoken::encode(&header, &claims, self.key.encoding()).map_err(|e| {
            error!(error = %e, "failed to sign token");
            TokenError::Signing
        })
    }

    /// Login-flow entry point: default TTL, `roles` taken from the identity.
    pub fn issue_for(&self, identity: &Identity) -> Result<String, TokenError> {
        let mut claims = Map::new();
        claims.insert(CLAIM_ROLES.to_string(), Value::from(identity.role_names()));
        self.issue(&identity.username, claims, self.default_ttl)
    }

    pub fn verify(&self, token: &str) -> Result<Claims, TokenError> {
        let claims = self.verify_signature(token)?;

        if claims.is_expired_at(self.clock.now()) {
            return Err(TokenError::TokenExpired);
        }

        Ok(claims)
    }

    /// Everything `verify` checks except expiry. Used where an expired but
    /// authentic token still has to be described (token introspection).
    pub fn verify_signature(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header), Some(_payload), Some(_signature), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::MalformedToken);
        };
        if token.split('.').any(str::is_empty) {
            return Err(TokenError::MalformedToken);
        }

        check_algorithm(header)?;

        let data = jsonwebtoken::decode::<Map<String, Value>>(
            token,
            self.key.decoding(),
            &self.validation,
        )
        .map_err(|e| map_jwt_error(e.kind()))?;

        Claims::from_payload(data.claims)
    }

    pub fn extract_subject(&self, token: &str) -> Result<String, TokenError> {
        self.verify(token).map(|c| c.sub)
    }

    pub fn extract_roles(&self, token: &str) -> Result<Vec<String>, TokenError> {
        self.verify(token)?.roles()
    }

    /// Final gate before trusting `token` for `expected_subject`.
    ///
    /// Expiry is checked again here, independently of `verify`, so that this
    /// gate keeps holding if `verify` is ever changed to skip it.
    pub fn is_valid_for(&self, token: &str, expected_subject: &str) -> bool {
        match self.verify(token) {
            Ok(claims) => {
                claims.sub == expected_subject && !claims.is_expired_at(self.clock.now())
            }
            Err(_) => false,
        }
    }
}

fn check_algorithm(header_b64: &str) -> Result<(), TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| TokenError::MalformedToken)?;
    let header: RawHeader =
        serde_json::from_slice(&bytes).map_err(|_| TokenError::MalformedToken)?;

    if header.alg != ALGORITHM {
        return Err(TokenError::UnsupportedAlgorithm);
    }
    Ok(())
}

// The header has already been checked, so a base64 failure here comes from the
// signature segment: the signature is verified before the payload is decoded.
fn map_jwt_error(kind: &ErrorKind) -> TokenError {
    match kind {
        ErrorKind::InvalidSignature | ErrorKind::Base64(_) => TokenError::InvalidSignature,
        ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
            TokenError::UnsupportedAlgorithm
        }
        ErrorKind::ExpiredSignature => TokenError::TokenExpired,
        ErrorKind::MissingRequiredClaim(_) => TokenError::InvalidClaims("required"),
        _ => TokenError::MalformedToken,
    }
}
