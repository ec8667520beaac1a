//! Credential validation.
//!
//! Turns a raw `Authorization` header into an [`Identity`] or an
//! [`AuthError`]. Token checking is delegated to the injected
//! [`TokenVerifier`].

use std::sync::Arc;

use axum::http::HeaderValue;
use chrono::Utc;
use thiserror::Error;

use crate::auth::identity::Identity;
use crate::auth::verifier::{TokenVerifier, VerifyError};

/// Authentication failure. Display strings are the client-facing messages.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header missing")]
    MissingHeader,

    #[error("Invalid Authorization header")]
    MalformedHeader,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    /// The verifier itself failed; not a statement about the token.
    #[error("token verifier failure: {0}")]
    Verifier(String),
}

impl From<VerifyError> for AuthError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::Invalid => AuthError::InvalidToken,
            VerifyError::Expired => AuthError::ExpiredToken,
            VerifyError::Unavailable(detail) => AuthError::Verifier(detail),
        }
    }
}

/// Validates bearer credentials against a [`TokenVerifier`].
#[derive(Clone)]
pub struct CredentialValidator {
    verifier: Arc<dyn TokenVerifier>,
}

impl CredentialValidator {
    const BEARER_PREFIX: &'static str = "Bearer ";

    pub fn new(verifier: Arc<dyn TokenVerifier>) -> Self {
        Self { verifier }
    }

    /// Extract the bearer token from a raw header value.
    pub fn extract_token(header: Option<&HeaderValue>) -> Result<&str, AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;
        if header.is_empty() {
            return Err(AuthError::MissingHeader);
        }

        let value = header.to_str().map_err(|_| AuthError::MalformedHeader)?;
        let token = value
            .strip_prefix(Self::BEARER_PREFIX)
            .filter(|t| !t.is_empty() && *t == t.trim())
            .ok_or(AuthError::MalformedHeader)?;

        Ok(token)
    }

    /// Validate the header and build the request's identity.
    pub async fn validate(&self, header: Option<&HeaderValue>) -> Result<Identity, AuthError> {
        let token = Self::extract_token(header)?;
        let claims = self.verifier.verify(token).await?;

        if claims.expires_at <= Utc::now() {
            return Err(AuthError::ExpiredToken);
        }

        Ok(Identity::from_claims(claims))
    }
}

impl std::fmt::Debug for CredentialValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialValidator").finish_non_exhaustive()
    }
}
