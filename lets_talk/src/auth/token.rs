//! Bearer token issuance and verification.
//!
//! Tokens are HS256 JWTs signed with a process-wide secret. They are not
//! stored anywhere: validity is the signature plus the embedded expiry, and
//! there is no refresh path. A new login is the only way to get a new token.

use chrono::Duration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use std::sync::Arc;

use super::{
    errors::{AuthResult, TokenError},
    models::{IssuedToken, TokenClaims, UserId},
};
use crate::clock::Clock;

/// Validity window of an issued token.
pub const TOKEN_VALIDITY_HOURS: i64 = 24;

/// Signs and verifies bearer tokens
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validity: Duration,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    /// Create a token service
    ///
    /// # Arguments
    ///
    /// * `secret` - HMAC secret shared by issuance and verification
    /// * `clock` - Time source for `iat`/`exp` and expiry checks
    pub fn new(secret: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validity: Duration::hours(TOKEN_VALIDITY_HOURS),
            clock,
        }
    }

    /// Override the validity window.
    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }

    /// Issue a token asserting `user_id`.
    pub fn issue(&self, user_id: UserId) -> AuthResult<IssuedToken> {
        let now = self.clock.now();
        let expires_at = now + self.validity;
        let claims = TokenClaims {
            sub: user_id,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)?;

        Ok(IssuedToken { token, expires_at })
    }

    /// Verify a token and return the user it names.
    ///
    /// Expiry is checked against the injected clock rather than by the JWT
    /// library, so `exp` has no leeway: one second past it is `Expired`.
    ///
    /// # Errors
    ///
    /// * `TokenError::Invalid` - Bad structure or signature
    /// * `TokenError::Expired` - Past the validity window
    pub fn verify(&self, token: &str) -> Result<UserId, TokenError> {
        let mut validation = Validation::default();
        validation.validate_exp = false;

        let data = decode::<TokenClaims>(token, &self.decoding_key, &validation)
            .map_err(|_| TokenError::Invalid)?;

        if self.clock.now().timestamp() > data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims.sub)
    }
}
