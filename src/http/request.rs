//! Inbound request capture.
//!
//! # Responsibilities
//! - Generate a unique request ID (UUID v4) when the client sent none
//! - Hand the body over unread; the pipeline buffers it after authentication
//! - Buffer the body once, enforcing the size limit
//! - Carry the per-request context (identity, target, deadline) through the pipeline
//!
//! # Design Decisions
//! - Oversize and unreadable bodies are recorded, not rejected here; the
//!   pipeline decides what the client sees
//! - Content-Length is checked before reading so large uploads are not drained

use std::net::SocketAddr;

use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::{Map, Value};
use tokio::time::Instant;
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

use crate::auth::Identity;
use crate::error::GatewayError;
use crate::routing::BackendTarget;

/// Header carrying the correlation ID, inbound and outbound.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Generates `x-request-id` values for requests that arrive without one.
#[derive(Debug, Clone, Copy, Default)]
pub struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Buffered request body.
#[derive(Debug, Clone)]
pub enum RawBody {
    /// Still on the wire, see [`BodyStream`].
    Unread,
    Complete(Bytes),
    TooLarge,
    Unreadable(String),
}

/// A client request as seen by the pipeline.
#[derive(Debug)]
pub struct GatewayRequest {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: RawBody,
    pub client_addr: Option<SocketAddr>,
    /// Absolute deadline for the whole request.
    pub deadline: Instant,
    identity: Option<Identity>,
    target: Option<BackendTarget>,
}

impl GatewayRequest {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: RawBody, deadline: Instant) -> Self {
        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        Self {
            request_id,
            method,
            uri,
            headers,
            body,
            client_addr: None,
            deadline,
            identity: None,
            target: None,
        }
    }

    /// Split an axum request without touching its body.
    ///
    /// The returned request holds [`RawBody::Unread`]; the body comes back
    /// as a [`BodyStream`] capped at `max_body_bytes`.
    pub fn from_http(
        request: Request<Body>,
        max_body_bytes: usize,
        deadline: Instant,
    ) -> (Self, BodyStream) {
        let (parts, body) = request.into_parts();

        let declared = parts
            .headers
            .get(header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        let stream = BodyStream {
            body,
            limit: max_body_bytes,
            declared,
        };
        let request = Self::new(parts.method, parts.uri, parts.headers, RawBody::Unread, deadline);
        (request, stream)
    }

    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = Some(addr);
        self
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    pub fn authorization(&self) -> Option<&HeaderValue> {
        self.headers.get(header::AUTHORIZATION)
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn target(&self) -> Option<&BackendTarget> {
        self.target.as_ref()
    }

    pub(crate) fn set_identity(&mut self, identity: Identity) {
        self.identity = Some(identity);
    }

    pub(crate) fn set_target(&mut self, target: BackendTarget) {
        self.target = Some(target);
    }

    /// Body bytes to forward. Empty unless the body was read completely.
    pub fn body_bytes(&self) -> Bytes {
        match &self.body {
            RawBody::Complete(bytes) => bytes.clone(),
            RawBody::Unread | RawBody::TooLarge | RawBody::Unreadable(_) => Bytes::new(),
        }
    }

    /// Top-level JSON attributes used for routing.
    ///
    /// An empty body counts as `{}` for methods that normally carry none.
    pub fn body_attributes(&self) -> Result<Map<String, Value>, GatewayError> {
        match &self.body {
            RawBody::Unread => Err(GatewayError::Internal("request body was never read".into())),
            RawBody::TooLarge => Err(GatewayError::PayloadTooLarge),
            RawBody::Unreadable(detail) => {
                tracing::debug!(request_id = %self.request_id, error = %detail, "Request body unreadable");
                Err(GatewayError::BadRequest)
            }
            RawBody::Complete(bytes) if bytes.is_empty() => {
                if allows_empty_body(&self.method) {
                    Ok(Map::new())
                } else {
                    Err(GatewayError::BadRequest)
                }
            }
            RawBody::Complete(bytes) => match serde_json::from_slice::<Value>(bytes) {
                Ok(Value::Object(map)) => Ok(map),
                Ok(_) | Err(_) => Err(GatewayError::BadRequest),
            },
        }
    }
}

fn allows_empty_body(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::DELETE | Method::OPTIONS
    )
}

/// Request body still on the wire.
///
/// Reading waits on the client, so callers bound [`BodyStream::read`] with
/// the request deadline.
#[derive(Debug)]
pub struct BodyStream {
    body: Body,
    limit: usize,
    declared: Option<u64>,
}

impl BodyStream {
    /// Stream `body`, accepting at most `limit` bytes.
    pub fn new(body: Body, limit: usize) -> Self {
        Self {
            body,
            limit,
            declared: None,
        }
    }

    /// Buffer the body. A declared length over the limit skips the read.
    pub async fn read(self) -> RawBody {
        if matches!(self.declared, Some(len) if len > self.limit as u64) {
            return RawBody::TooLarge;
        }
        match Limited::new(self.body, self.limit).collect().await {
            Ok(collected) => RawBody::Complete(collected.to_bytes()),
            Err(err) if err.downcast_ref::<LengthLimitError>().is_some() => RawBody::TooLarge,
            Err(err) => RawBody::Unreadable(err.to_string()),
        }
    }
}
