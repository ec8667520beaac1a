//! Gateway error taxonomy.
//!
//! Every failure is classified by the component that detects it and
//! converted into a [`GatewayError`]. The pipeline never re-derives a
//! classification from component internals.
//!
//! Client-facing messages are fixed per kind; internal details are logged
//! and never sent to clients.

use axum::{
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::forward::ForwardError;
use crate::routing::ResolveError;

/// Response header carrying the machine-readable error kind.
pub const ERROR_KIND_HEADER: &str = "x-gateway-error-kind";

/// Terminal classification of a rejected request.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Invalid request payload")]
    BadRequest,

    #[error("Request payload too large")]
    PayloadTooLarge,

    #[error("No matching route found")]
    NotFound,

    #[error("Insufficient scope for route")]
    Forbidden,

    #[error("Backend timed out")]
    BackendTimeout,

    #[error("Backend unavailable")]
    BackendUnavailable,

    #[error("Request deadline exceeded")]
    DeadlineExceeded,

    /// Unmodeled fault; the detail is logged, not exposed.
    #[error("Internal server error")]
    Internal(String),
}

impl GatewayError {
    /// Stable tag for programmatic handling.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Auth(AuthError::MissingHeader) => "missing_header",
            GatewayError::Auth(AuthError::MalformedHeader) => "malformed_header",
            GatewayError::Auth(AuthError::InvalidToken) => "invalid_token",
            GatewayError::Auth(AuthError::ExpiredToken) => "expired_token",
            GatewayError::Auth(AuthError::Verifier(_)) => "internal",
            GatewayError::BadRequest => "bad_request",
            GatewayError::PayloadTooLarge => "payload_too_large",
            GatewayError::NotFound => "not_found",
            GatewayError::Forbidden => "forbidden",
            GatewayError::BackendTimeout => "backend_timeout",
            GatewayError::BackendUnavailable => "backend_unavailable",
            GatewayError::DeadlineExceeded => "deadline_exceeded",
            GatewayError::Internal(_) => "internal",
        }
    }

    /// Client-visible status code.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth(AuthError::Verifier(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::BadRequest => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::NotFound => StatusCode::NOT_FOUND,
            GatewayError::Forbidden => StatusCode::FORBIDDEN,
            GatewayError::BackendTimeout | GatewayError::DeadlineExceeded => {
                StatusCode::GATEWAY_TIMEOUT
            }
            GatewayError::BackendUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `error` field of the response body.
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Auth(AuthError::Verifier(_)) => {
                GatewayError::Internal(String::new()).to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        if let GatewayError::Internal(detail) | GatewayError::Auth(AuthError::Verifier(detail)) = &self {
            tracing::error!(error = %detail, "Internal gateway fault");
        }

        let body = Json(json!({ "error": self.client_message() }));
        let mut response = (self.status(), body).into_response();
        response
            .headers_mut()
            .insert(ERROR_KIND_HEADER, HeaderValue::from_static(self.kind()));
        response
    }
}

impl From<ResolveError> for GatewayError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::NoMatch => GatewayError::NotFound,
            ResolveError::Forbidden => GatewayError::Forbidden,
            ResolveError::UnknownService(_) => GatewayError::BackendUnavailable,
        }
    }
}

impl From<ForwardError> for GatewayError {
    fn from(err: ForwardError) -> Self {
        match err {
            ForwardError::Timeout => GatewayError::BackendTimeout,
            ForwardError::Unavailable(_) => GatewayError::BackendUnavailable,
            ForwardError::InvalidTarget(detail) => GatewayError::Internal(detail),
        }
    }
}
