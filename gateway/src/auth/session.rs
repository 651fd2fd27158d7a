// gateway/src/auth/session.rs
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::distributions::Alphanumeric;
use rand::{thread_rng, Rng};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::credentials::User;

/// Only HMAC signatures are ever accepted
const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// Identity carried inside a validated session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewer {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ViewerClaims {
    #[serde(rename = "uuid")]
    id: Uuid,
    email: String,
    iss: String,
    iat: u64,
    exp: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token not found")]
    Missing,

    #[error("invalid token: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
}

/// Issues and validates signed session tokens
pub struct SessionService {
    issuer: String,
    ttl: Duration,
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionService {
    pub fn new(secret: &[u8], issuer: impl Into<String>, ttl: Duration) -> Self {
        Self {
            issuer: issuer.into(),
            ttl,
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Build from configuration, generating a process-local secret when none is set
    pub fn from_config(auth: &common::AuthConfig) -> Self {
        let secret = if auth.secret.is_empty() {
            tracing::warn!("No auth secret configured; generated an ephemeral one. Tokens will not survive a restart.");
            generate_secure_token(64)
        } else {
            auth.secret.clone()
        };
        Self::new(secret.as_bytes(), auth.issuer.clone(), Duration::from_secs(auth.token_ttl_secs))
    }

    pub fn issue(&self, user: &User) -> Result<String, TokenError> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = ViewerClaims {
            id: user.id,
            email: user.email.clone(),
            iss: self.issuer.clone(),
            iat: now,
            exp: now + self.ttl.as_secs(),
        };
        self.sign(&claims)
    }

    fn sign(&self, claims: &ViewerClaims) -> Result<String, TokenError> {
        Ok(encode(&Header::new(Algorithm::HS256), claims, &self.encoding)?)
    }

    /// Fails closed: every problem with the token is an error, never a panic
    pub fn validate(&self, token: &str) -> Result<Viewer, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.set_issuer(&[self.issuer.as_str()]);

        let data = decode::<ViewerClaims>(token, &self.decoding, &validation).map_err(|e| {
            tracing::debug!("auth.error: {:?}", e.kind());
            TokenError::from(e)
        })?;

        Ok(Viewer {
            id: data.claims.id,
            email: data.claims.email,
        })
    }

    /// Structural decode only. Callers must have validated the token first.
    pub fn decode(&self, token: &str) -> Result<Viewer, TokenError> {
        if token.is_empty() {
            return Err(TokenError::Missing);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = decode::<ViewerClaims>(token, &self.decoding, &validation)?;
        Ok(Viewer {
            id: data.claims.id,
            email: data.claims.email,
        })
    }
}

/// Generate a random alphanumeric string of the given length
pub fn generate_secure_token(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::CredentialStore;

    // {"alg":"RS256","typ":"JWT"} and {"alg":"none","typ":"JWT"}
    const RS256_HEADER: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9";
    const NONE_HEADER: &str = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0";

    fn service() -> SessionService {
        SessionService::new(b"test-secret", "vaclav", Duration::from_secs(3600))
    }

    fn user() -> User {
        let store = CredentialStore::with_cost(4).unwrap();
        store.add_user("test@example.com", "test1234").unwrap()
    }

    fn segments(token: &str) -> Vec<&str> {
        token.split('.').collect()
    }

    #[test]
    fn test_issue_then_validate() {
        let service = service();
        let user = user();
        let token = service.issue(&user).unwrap();

        let viewer = service.validate(&token).unwrap();
        assert_eq!(viewer.id, user.id);
        assert_eq!(viewer.email, "test@example.com");
        assert_eq!(service.decode(&token).unwrap(), viewer);
    }

    #[test]
    fn test_swapped_signature_rejected() {
        let service = service();
        let other = SessionService::new(b"other-secret", "vaclav", Duration::from_secs(3600));
        let user = user();

        let token = service.issue(&user).unwrap();
        let forged = other.issue(&user).unwrap();
        let (ours, theirs) = (segments(&token), segments(&forged));
        let tampered = format!("{}.{}.{}", ours[0], ours[1], theirs[2]);

        assert!(service.validate(&tampered).is_err());
        assert!(service.validate(&forged).is_err());
    }

    #[test]
    fn test_modified_payload_rejected() {
        let service = service();
        let a = service.issue(&user()).unwrap();
        let b = service.issue(&user()).unwrap();
        let (a, b) = (segments(&a), segments(&b));
        let spliced = format!("{}.{}.{}", a[0], b[1], a[2]);
        assert!(service.validate(&spliced).is_err());
    }

    #[test]
    fn test_non_hmac_algorithms_rejected() {
        let service = service();
        let token = service.issue(&user()).unwrap();
        let parts = segments(&token);

        let rs256 = format!("{}.{}.{}", RS256_HEADER, parts[1], parts[2]);
        assert!(service.validate(&rs256).is_err());

        let none = format!("{}.{}.", NONE_HEADER, parts[1]);
        assert!(service.validate(&none).is_err());
    }

    #[test]
    fn test_wrong_issuer_rejected() {
        let user = user();
        let foreign = SessionService::new(b"test-secret", "someone-else", Duration::from_secs(3600));
        let token = foreign.issue(&user).unwrap();
        assert!(service().validate(&token).is_err());
    }

    #[test]
    fn test_expired_rejected() {
        let service = service();
        let now = Utc::now().timestamp() as u64;
        let claims = ViewerClaims {
            id: Uuid::new_v4(),
            email: "test@example.com".into(),
            iss: "vaclav".into(),
            iat: now - 7200,
            exp: now - 3600,
        };
        let token = service.sign(&claims).unwrap();
        assert!(service.validate(&token).is_err());
        // Structural decode does not care about expiry
        assert_eq!(service.decode(&token).unwrap().email, "test@example.com");
    }

    #[test]
    fn test_garbage_rejected() {
        let service = service();
        assert!(matches!(service.validate(""), Err(TokenError::Missing)));
        assert!(service.validate("not-a-token").is_err());
        assert!(service.validate("a.b.c").is_err());
    }

    #[test]
    fn test_generate_secure_token() {
        let token = generate_secure_token(32);
        assert_eq!(token.len(), 32);
        assert_ne!(token, generate_secure_token(32));
    }
}
