//! Signed identity tokens

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::AuthError;

/// Issuer written into every token this service signs.
pub const ISSUER: &str = "gatehouse";

/// Authentication method that produced a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ClaimType {
    Internal,
}

impl ClaimType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimType::Internal => "Internal",
        }
    }
}

/// Token payload
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IdentityClaims {
    /// Subject (user id)
    pub sub: String,
    /// Username at issuance time
    pub username: String,
    /// How this identity was established
    pub claim_type: ClaimType,
    /// Server-side session correlated with this token
    pub session_id: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuing service
    pub iss: String,
}

/// Encodes and decodes signed, time-limited identity tokens.
///
/// Decoding is a pure local operation; whether the embedded session is
/// still live is the registry's question, not the codec's.
#[derive(Clone)]
pub struct TokenCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetime_hours: i64,
}

impl TokenCodec {
    /// Create a codec signing with `secret`; every token it issues is
    /// valid for `lifetime_hours` from issuance.
    pub fn new(secret: &str, lifetime_hours: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            lifetime_hours,
        }
    }

    /// Sign a token embedding the given identity and session id.
    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        claim_type: ClaimType,
        session_id: &str,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + Duration::hours(self.lifetime_hours);

        let claims = IdentityClaims {
            sub: user_id.to_string(),
            username: username.to_string(),
            claim_type,
            session_id: session_id.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            iss: ISSUER.to_string(),
        };

        debug!("Issuing token for user: {}", username);

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Verify signature, issuer and expiry, returning the embedded claims.
    pub fn decode(&self, token: &str) -> Result<IdentityClaims, AuthError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);

        let token_data = decode::<IdentityClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| AuthError::InvalidToken)?;

        // The default validation allows 60s of leeway; enforce the exact
        // expiry on top of it.
        let now = Utc::now().timestamp();
        if token_data.claims.exp < now {
            return Err(AuthError::InvalidToken);
        }

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_and_decode_round_trip() {
        let codec = TokenCodec::new("test-secret-key", 24);

        let token = codec
            .issue("user-1", "alice", ClaimType::Internal, "sess-1")
            .unwrap();
        let claims = codec.decode(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.username, "alice");
        assert_eq!(claims.claim_type, ClaimType::Internal);
        assert_eq!(claims.session_id, "sess-1");
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_garbage_token_rejected() {
        let codec = TokenCodec::new("test-secret-key", 24);

        assert!(codec.decode("not-a-token").is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let codec = TokenCodec::new("test-secret-key", 24);
        let other = TokenCodec::new("another-secret", 24);

        let token = codec
            .issue("user-1", "alice", ClaimType::Internal, "sess-1")
            .unwrap();

        assert!(other.decode(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        // A negative lifetime produces a token that expired before it was
        // issued, well past the decode leeway.
        let codec = TokenCodec::new("test-secret-key", -2);

        let token = codec
            .issue("user-1", "alice", ClaimType::Internal, "sess-1")
            .unwrap();

        assert!(codec.decode(&token).is_err());
    }
}
