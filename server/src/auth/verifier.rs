use crate::auth::jwt;
use crate::auth::{AuthError, Identity};

/// Validates an opaque bearer credential and extracts the identity it claims.
///
/// Implementations must be free of side effects: the same credential checked
/// at the same instant always yields the same outcome.
pub trait CredentialVerifier: Send + Sync {
    fn verify(&self, credential: Option<&str>) -> Result<Identity, AuthError>;
}

/// Verifies HS256 JWTs against a signing secret fixed at startup.
#[derive(Clone)]
pub struct JwtVerifier {
    secret: Vec<u8>,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl CredentialVerifier for JwtVerifier {
    fn verify(&self, credential: Option<&str>) -> Result<Identity, AuthError> {
        let token = credential
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::Missing)?;

        let claims = jwt::validate_token(&self.secret, token)?;
        Ok(Identity {
            username: claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> JwtVerifier {
        JwtVerifier::new(b"unit-secret".to_vec())
    }

    #[test]
    fn test_missing_credential() {
        assert_eq!(verifier().verify(None), Err(AuthError::Missing));
        assert_eq!(verifier().verify(Some("")), Err(AuthError::Missing));
        assert_eq!(verifier().verify(Some("  ")), Err(AuthError::Missing));
    }

    #[test]
    fn test_valid_credential_yields_username() {
        let token = jwt::issue_token(b"unit-secret", "alice", 60).unwrap();
        let identity = verifier().verify(Some(&token)).unwrap();
        assert_eq!(identity.username, "alice");
    }

    #[test]
    fn test_expired_credential() {
        let token = jwt::issue_token(b"unit-secret", "alice", -5).unwrap();
        assert_eq!(verifier().verify(Some(&token)), Err(AuthError::Expired));
    }

    #[test]
    fn test_foreign_credential() {
        let token = jwt::issue_token(b"someone-else", "mallory", 60).unwrap();
        assert_eq!(verifier().verify(Some(&token)), Err(AuthError::Invalid));
    }
}
