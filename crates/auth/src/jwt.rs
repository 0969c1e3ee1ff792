//! HS256 JWT encoding/decoding on top of the pure claims model.
//!
//! Signature verification happens here; time-window checks stay in
//! [`crate::claims::validate_claims`] so they remain deterministic and
//! testable without key material.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{validate_claims, JwtClaims, TokenValidationError};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token decoding/signature verification failed: {0}")]
    Decode(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Validates a bearer token into [`JwtClaims`].
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// HS256 (shared-secret) JWT validator.
pub struct Hs256JwtValidator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Claims carry their own RFC3339 time window; expiry is enforced by
        // `validate_claims`, not by the numeric `exp` claim.
        validation.validate_exp = false;
        validation.required_spec_claims = Default::default();

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.decoding_key, &self.validation)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// Encode claims with an HS256 shared secret (token minting for tests/dev).
pub fn encode_hs256(claims: &JwtClaims, secret: impl AsRef<[u8]>) -> Result<String, JwtError> {
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )?;
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrincipalId, Role};
    use chrono::Duration;
    use velora_core::ShopId;

    fn mint(secret: &str, issued: DateTime<Utc>, expires: DateTime<Utc>) -> (JwtClaims, String) {
        let claims = JwtClaims {
            sub: PrincipalId::new(),
            shop_id: ShopId::new(),
            roles: vec![Role::new("admin")],
            issued_at: issued,
            expires_at: expires,
        };
        let token = encode_hs256(&claims, secret).unwrap();
        (claims, token)
    }

    #[test]
    fn round_trips_valid_token() {
        let now = Utc::now();
        let (claims, token) = mint("s3cret", now - Duration::minutes(1), now + Duration::minutes(5));

        let validator = Hs256JwtValidator::new("s3cret");
        let decoded = validator.validate(&token, now).unwrap();
        assert_eq!(decoded, claims);
    }

    #[test]
    fn rejects_wrong_secret() {
        let now = Utc::now();
        let (_claims, token) = mint("s3cret", now, now + Duration::minutes(5));

        let validator = Hs256JwtValidator::new("other");
        assert!(matches!(
            validator.validate(&token, now),
            Err(JwtError::Decode(_))
        ));
    }

    #[test]
    fn rejects_expired_claims() {
        let now = Utc::now();
        let (_claims, token) = mint("s3cret", now - Duration::minutes(10), now - Duration::minutes(5));

        let validator = Hs256JwtValidator::new("s3cret");
        assert!(matches!(
            validator.validate(&token, now),
            Err(JwtError::Claims(TokenValidationError::Expired))
        ));
    }
}
