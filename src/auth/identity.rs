//! Authenticated principal.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

/// Claims returned by a [`TokenVerifier`](crate::auth::TokenVerifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// Opaque subject identifier.
    pub subject: String,
    /// Granted scopes.
    pub scopes: BTreeSet<String>,
    /// Token expiry.
    pub expires_at: DateTime<Utc>,
}

impl VerifiedClaims {
    pub fn new(
        subject: impl Into<String>,
        scopes: impl IntoIterator<Item = impl Into<String>>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            scopes: scopes.into_iter().map(Into::into).collect(),
            expires_at,
        }
    }
}

/// Result of successful authentication.
///
/// Only the credential validator constructs an `Identity`. It is not
/// `Clone`: it lives inside one request and is dropped with it.
#[derive(Debug)]
pub struct Identity {
    subject: String,
    scopes: BTreeSet<String>,
    expires_at: DateTime<Utc>,
}

impl Identity {
    pub(crate) fn from_claims(claims: VerifiedClaims) -> Self {
        Self {
            subject: claims.subject,
            scopes: claims.scopes,
            expires_at: claims.expires_at,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(String::as_str)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }
}
