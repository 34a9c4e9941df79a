//! Credential verification for the upgrade gate.
//!
//! Credentials are HS256 JWTs carrying a `username` claim. The relay only
//! needs the [`CredentialVerifier`] capability; how tokens are issued or
//! cached client-side is not its concern.

pub mod jwt;
pub mod verifier;

pub use verifier::{CredentialVerifier, JwtVerifier};

/// Why a credential was refused at the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no credential supplied")]
    Missing,
    #[error("credential signature or structure is invalid")]
    Invalid,
    #[error("credential has expired")]
    Expired,
}

impl AuthError {
    /// Short label for structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Invalid => "invalid",
            Self::Expired => "expired",
        }
    }
}

/// A verified identity claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
}
