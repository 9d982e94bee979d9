use base64::{Engine, engine::general_purpose::STANDARD};
use jsonwebtoken::{DecodingKey, EncodingKey};

/// HS256 needs a key at least as long as the SHA-256 output.
pub const MIN_SECRET_BYTES: usize = 32;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SigningKeyError {
    #[error("secret is not valid base64")]
    NotBase64,
    #[error("secret is {len} bytes, need at least {MIN_SECRET_BYTES}")]
    TooShort { len: usize },
}

/// Process-wide HMAC secret.
///
/// Key material is intentionally not printable via Debug.
#[derive(Clone)]
pub struct SigningKey {
    encoding: EncodingKey,
    decoding: DecodingKey,
    len: usize,
}

impl SigningKey {
    /// `secret_b64` is standard (padded) base64.
    pub fn from_base64(secret_b64: &str) -> Result<Self, SigningKeyError> {
        let bytes = STANDARD
            .decode(secret_b64.trim())
            .map_err(|_| SigningKeyError::NotBase64)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SigningKeyError> {
        if bytes.len() < MIN_SECRET_BYTES {
            return Err(SigningKeyError::TooShort { len: bytes.len() });
        }

        Ok(Self {
            encoding: EncodingKey::from_secret(bytes),
            decoding: DecodingKey::from_secret(bytes),
            len: bytes.len(),
        })
    }

    pub(crate) fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    pub(crate) fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey")
            .field("len", &self.len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_32_byte_secret() {
        let secret = STANDARD.encode([7u8; 32]);
        assert!(SigningKey::from_base64(&secret).is_ok());
    }

    #[test]
    fn rejects_short_secret() {
        let secret = STANDARD.encode([7u8; 31]);
        assert_eq!(
            SigningKey::from_base64(&secret).unwrap_err(),
            SigningKeyError::TooShort { len: 31 }
        );
    }

    #[test]
    fn rejects_non_base64_secret() {
        assert_eq!(
            SigningKey::from_base64("not base64 at all!").unwrap_err(),
            SigningKeyError::NotBase64
        );
    }

    #[test]
    fn debug_does_not_print_key_bytes() {
        let key = SigningKey::from_bytes(&[0xAB; 32]).unwrap();
        let printed = format!("{key:?}");
        assert!(printed.contains("len: 32"));
        assert!(!printed.contains("171"));
    }
}
