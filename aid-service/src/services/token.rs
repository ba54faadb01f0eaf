use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::SessionConfig;

/// Session token issuer and verifier (HS256 over a process-wide secret).
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    validity: Duration,
    skew_tolerance: Duration,
}

/// Claims carried by every session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Issuer: the identity key (mail).
    pub iss: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Not before (Unix timestamp), backdated by the skew tolerance
    pub nbf: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique per issue so two tokens are never equal.
    pub jti: String,
}

/// Externally visible verification failures.
///
/// Finer causes (bad signature vs. bad encoding, early vs. late) are
/// folded together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token expired or not yet valid")]
    Expired,
}

impl TokenService {
    pub fn new(config: &SessionConfig) -> Result<Self, anyhow::Error> {
        if config.signing_secret.is_empty() {
            return Err(anyhow::anyhow!("Session signing secret must not be empty"));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Temporal claims are checked against the caller's clock in `verify`.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "nbf", "iss"]);

        tracing::info!(
            validity_minutes = config.validity_minutes,
            skew_seconds = config.skew_seconds,
            "Session token service initialized"
        );

        Ok(Self {
            encoding_key: EncodingKey::from_secret(config.signing_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.signing_secret.as_bytes()),
            validation,
            validity: Duration::try_minutes(config.validity_minutes)
                .ok_or_else(|| anyhow::anyhow!("Session validity window is out of range"))?,
            skew_tolerance: Duration::try_seconds(config.skew_seconds)
                .ok_or_else(|| anyhow::anyhow!("Session skew tolerance is out of range"))?,
        })
    }

    /// Issue a signed token for `identity_key`. Callers own the session-store bookkeeping.
    pub fn issue(&self, identity_key: &str, now: DateTime<Utc>) -> Result<String, anyhow::Error> {
        let not_before = now
            .checked_sub_signed(self.skew_tolerance)
            .ok_or_else(|| anyhow::anyhow!("Session not-before time is out of range"))?;
        let expires = now
            .checked_add_signed(self.validity)
            .ok_or_else(|| anyhow::anyhow!("Session expiry time is out of range"))?;

        let claims = SessionClaims {
            iss: identity_key.to_string(),
            iat: now.timestamp(),
            nbf: not_before.timestamp(),
            exp: expires.timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))
    }

    /// Check the signature first, then `nbf <= now <= exp`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenError> {
        let claims = decode::<SessionClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "Session token rejected");
                TokenError::Malformed
            })?
            .claims;

        let now = now.timestamp();
        if claims.nbf > now || now > claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    pub fn validity(&self) -> Duration {
        self.validity
    }
}
