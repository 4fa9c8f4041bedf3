//! Bearer token verification
//!
//! Tokens are HS256 JWTs sharing a secret between the issuer (the director)
//! and the verifier. A token is accepted when its signature, expiry and issuer
//! check out and its space-separated `scope` claim carries the required scope.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::common::config::TokenConfig;
use crate::common::{Error, Result};

/// JWT claims checked by [`JwtVerifier`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Issuer (the director URL)
    pub iss: String,
    /// Subject
    #[serde(default)]
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Space-separated scopes
    #[serde(default)]
    pub scope: String,
}

impl Claims {
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

/// Checks bearer tokens presented to protected routes.
///
/// `Ok(false)` means a well-formed token that must be rejected; `Err` means
/// the token could not be evaluated at all.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<bool>;
}

pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
    scope: String,
}

impl JwtVerifier {
    pub fn new(secret: &[u8], issuer: &str, scope: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[issuer]);
        validation.set_required_spec_claims(&["exp", "iss"]);
        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            scope: scope.to_string(),
        }
    }

    pub fn from_config(config: &TokenConfig) -> Self {
        Self::new(config.secret.as_bytes(), &config.issuer, &config.scope)
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<bool> {
        match decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Ok(data.claims.has_scope(&self.scope)),
            Err(e) => match e.kind() {
                ErrorKind::ExpiredSignature
                | ErrorKind::InvalidSignature
                | ErrorKind::InvalidIssuer
                | ErrorKind::ImmatureSignature => Ok(false),
                _ => Err(Error::Auth(format!("invalid token: {}", e))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";
    const ISSUER: &str = "https://director.example.org";

    fn token(iss: &str, scope: &str, exp_offset: i64, secret: &[u8]) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            iss: iss.to_string(),
            sub: "director".to_string(),
            exp: (now + exp_offset) as u64,
            scope: scope.to_string(),
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret)).unwrap()
    }

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(SECRET, ISSUER, "director.test_report")
    }

    #[test]
    fn test_valid_token() {
        let t = token(ISSUER, "other director.test_report", 300, SECRET);
        assert!(verifier().verify(&t).unwrap());
    }

    #[test]
    fn test_missing_scope_rejected() {
        let t = token(ISSUER, "other", 300, SECRET);
        assert!(!verifier().verify(&t).unwrap());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let t = token("https://elsewhere", "director.test_report", 300, SECRET);
        assert!(!verifier().verify(&t).unwrap());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let t = token(ISSUER, "director.test_report", 300, b"nope");
        assert!(!verifier().verify(&t).unwrap());
    }

    #[test]
    fn test_expired_rejected() {
        let t = token(ISSUER, "director.test_report", -3600, SECRET);
        assert!(!verifier().verify(&t).unwrap());
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(matches!(verifier().verify("not-a-jwt"), Err(Error::Auth(_))));
    }
}
