//! Token verification capability.
//!
//! The gateway depends only on [`TokenVerifier`]; JWT, opaque-token lookup
//! or mTLS-derived identities plug in behind it. [`StaticTokenVerifier`]
//! serves fixed tokens from configuration.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::auth::identity::VerifiedClaims;
use crate::config::TokenConfig;

/// Lifetime reported for static tokens without an explicit expiry.
const STATIC_TOKEN_TTL_SECS: i64 = 3600;

/// Verification outcome other than success.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token rejected")]
    Invalid,

    #[error("token expired")]
    Expired,

    #[error("verifier unavailable: {0}")]
    Unavailable(String),
}

/// Turns a bearer token into verified claims.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError>;
}

#[derive(Debug, Clone)]
struct StaticToken {
    subject: String,
    scopes: Vec<String>,
    expires_at: Option<DateTime<Utc>>,
}

/// Verifier backed by a fixed token table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, StaticToken>,
}

impl StaticTokenVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[[auth.tokens]]` configuration entries.
    pub fn from_config(tokens: &[TokenConfig]) -> Self {
        tokens.iter().fold(Self::new(), |verifier, t| {
            verifier.with_entry(&t.token, &t.subject, t.scopes.clone(), t.expires_at)
        })
    }

    /// Register a token that never expires.
    pub fn with_token(
        self,
        token: impl Into<String>,
        subject: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let scopes = scopes.into_iter().map(Into::into).collect();
        self.with_entry(token, subject, scopes, None)
    }

    /// Register a token with a fixed expiry.
    pub fn with_expiring_token(
        self,
        token: impl Into<String>,
        subject: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        self.with_entry(token, subject, Vec::new(), Some(expires_at))
    }

    fn with_entry(
        mut self,
        token: impl Into<String>,
        subject: impl Into<String>,
        scopes: Vec<String>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        self.tokens.insert(
            token.into(),
            StaticToken {
                subject: subject.into(),
                scopes,
                expires_at,
            },
        );
        self
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedClaims, VerifyError> {
        let entry = self.tokens.get(token).ok_or(VerifyError::Invalid)?;
        let now = Utc::now();

        let expires_at = match entry.expires_at {
            Some(at) if at <= now => return Err(VerifyError::Expired),
            Some(at) => at,
            None => now + Duration::seconds(STATIC_TOKEN_TTL_SECS),
        };

        Ok(VerifiedClaims::new(
            entry.subject.clone(),
            entry.scopes.iter().cloned(),
            expires_at,
        ))
    }
}
