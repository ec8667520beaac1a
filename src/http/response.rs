//! Terminal results and their HTTP rendering.
//!
//! A relayed backend response keeps its status, headers (minus hop-by-hop)
//! and body byte for byte. A rejection renders as `{"error": "<message>"}`
//! with the error kind in a response header.

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::error::GatewayError;
use crate::http::headers::strip_hop_by_hop;

/// Backend response, fully buffered.
#[derive(Debug, Clone)]
pub struct ForwardedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// What the client receives.
#[derive(Debug)]
pub enum GatewayResult {
    Forwarded(ForwardedResponse),
    Rejected(GatewayError),
}

impl GatewayResult {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayResult::Forwarded(response) => response.status,
            GatewayResult::Rejected(err) => err.status(),
        }
    }

    /// Error kind tag, or `"ok"` for relayed responses.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayResult::Forwarded(_) => "ok",
            GatewayResult::Rejected(err) => err.kind(),
        }
    }

    pub fn error(&self) -> Option<&GatewayError> {
        match self {
            GatewayResult::Forwarded(_) => None,
            GatewayResult::Rejected(err) => Some(err),
        }
    }
}

impl From<GatewayError> for GatewayResult {
    fn from(err: GatewayError) -> Self {
        GatewayResult::Rejected(err)
    }
}

impl IntoResponse for ForwardedResponse {
    fn into_response(self) -> Response {
        let mut headers = self.headers;
        strip_hop_by_hop(&mut headers);

        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = headers;
        response
    }
}

impl IntoResponse for GatewayResult {
    fn into_response(self) -> Response {
        match self {
            GatewayResult::Forwarded(response) => response.into_response(),
            GatewayResult::Rejected(err) => err.into_response(),
        }
    }
}
