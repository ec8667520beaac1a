//! Authentication subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → validator.rs (presence, `Bearer ` scheme, token extraction)
//!     → verifier.rs (injected TokenVerifier: token → claims)
//!     → identity.rs (request-scoped Identity built from claims)
//! ```
//!
//! # Design Decisions
//! - Missing and malformed headers are distinct errors
//! - The validator performs no cryptographic work
//! - Verification failures are terminal, never retried

pub mod identity;
pub mod validator;
pub mod verifier;

pub use identity::{Identity, VerifiedClaims};
pub use validator::{AuthError, CredentialValidator};
pub use verifier::{StaticTokenVerifier, TokenVerifier, VerifyError};
