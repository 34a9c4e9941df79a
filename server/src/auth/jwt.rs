use chrono::Utc;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::auth::AuthError;

/// Default credential lifetime (1 hour).
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 3600;

/// Claims carried by a relay credential.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Identity claim shown to peers as the sender of chat frames
    pub username: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration (Unix timestamp)
    pub exp: i64,
}

/// Issue a credential for `username`, valid for `ttl_secs` seconds.
/// Claims: username, iat, exp
pub fn issue_token(
    secret: &[u8],
    username: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let now = Utc::now().timestamp();
    let claims = Claims {
        username: username.to_string(),
        iat: now,
        exp: now + ttl_secs,
    };

    encode(
        &Header::default(), // HS256
        &claims,
        &EncodingKey::from_secret(secret),
    )
}

/// Validate a credential and return its claims.
///
/// Expiry is checked without leeway: a token is rejected as soon as `exp`
/// is reached.
pub fn validate_token(secret: &[u8], token: &str) -> Result<Claims, AuthError> {
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp"]);

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::Expired,
            _ => AuthError::Invalid,
        })?;

    // validate_exp only rejects exp < now; the window closes at exp itself
    if token_data.claims.exp <= Utc::now().timestamp() {
        return Err(AuthError::Expired);
    }

    if token_data.claims.username.trim().is_empty() {
        return Err(AuthError::Invalid);
    }

    Ok(token_data.claims)
}
