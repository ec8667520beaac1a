//! Backend request forwarding.
//!
//! # Responsibilities
//! - Build the outbound request (method, path, query, rewritten headers)
//! - Bound each attempt by the route budget and the request deadline
//! - Retry GET/HEAD once after a connection failure or attempt timeout
//! - Relay the backend response, 4xx/5xx included
//!
//! # Design Decisions
//! - Backend status codes are never retried; only transport failures are
//! - Protocol errors fail immediately
//! - Identity headers sent by the client are replaced, never passed through

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Uri};
use thiserror::Error;
use tokio::time::timeout_at;

use crate::config::GatewayConfig;
use crate::forward::transport::{HyperTransport, Transport, TransportError};
use crate::http::headers::{append_forwarded_for, strip_hop_by_hop, X_USER_ID, X_USER_SCOPES};
use crate::http::request::X_REQUEST_ID;
use crate::http::{ForwardedResponse, GatewayRequest, GatewayResult};
use crate::observability::metrics;
use crate::resilience::{attempt_deadline, sleep_before, RetryPolicy};
use crate::routing::BackendTarget;

/// Why forwarding produced no backend response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForwardError {
    #[error("backend attempt timed out")]
    Timeout,

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid backend target: {0}")]
    InvalidTarget(String),
}

/// Forwarding seam used by the pipeline.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, target: &BackendTarget, request: &GatewayRequest) -> GatewayResult;
}

/// Forwards over a [`Transport`] with the single-retry policy.
pub struct RequestForwarder {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl RequestForwarder {
    pub fn new(transport: Arc<dyn Transport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    /// Hyper transport plus the configured retry policy.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self::new(
            Arc::new(HyperTransport::new(config.limits.max_response_bytes)),
            RetryPolicy::from_config(&config.retries),
        )
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn try_forward(
        &self,
        target: &BackendTarget,
        request: &GatewayRequest,
    ) -> Result<ForwardedResponse, ForwardError> {
        let uri = outbound_uri(target, &request.uri)?;
        let headers = outbound_headers(request);
        let body = request.body_bytes();
        let max_attempts = self.policy.max_attempts(&request.method);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let outbound = build_request(&request.method, &uri, &headers, body.clone());
            let deadline = attempt_deadline(target.timeout, request.deadline);

            let failure = match timeout_at(deadline, self.transport.send(outbound)).await {
                Ok(Ok(response)) => {
                    metrics::record_backend_attempt(&target.route, "response");
                    tracing::debug!(
                        request_id = %request.request_id,
                        route = %target.route,
                        attempt,
                        status = %response.status,
                        "Backend responded"
                    );
                    return Ok(response);
                }
                Ok(Err(TransportError::Protocol(detail))) => {
                    metrics::record_backend_attempt(&target.route, "protocol");
                    tracing::warn!(
                        request_id = %request.request_id,
                        route = %target.route,
                        error = %detail,
                        "Backend protocol error"
                    );
                    return Err(ForwardError::Unavailable(detail));
                }
                Ok(Err(TransportError::Connection(detail))) => {
                    metrics::record_backend_attempt(&target.route, "connection");
                    ForwardError::Unavailable(detail)
                }
                Err(_) => {
                    metrics::record_backend_attempt(&target.route, "timeout");
                    ForwardError::Timeout
                }
            };

            if attempt >= max_attempts || !sleep_before(self.policy.delay(), request.deadline).await {
                tracing::warn!(
                    request_id = %request.request_id,
                    route = %target.route,
                    attempt,
                    error = %failure,
                    "Backend request failed"
                );
                return Err(failure);
            }

            tracing::info!(
                request_id = %request.request_id,
                route = %target.route,
                attempt,
                error = %failure,
                "Retrying backend request"
            );
        }
    }
}

#[async_trait]
impl Forwarder for RequestForwarder {
    async fn forward(&self, target: &BackendTarget, request: &GatewayRequest) -> GatewayResult {
        match self.try_forward(target, request).await {
            Ok(response) => GatewayResult::Forwarded(response),
            Err(err) => GatewayResult::Rejected(err.into()),
        }
    }
}

impl std::fmt::Debug for RequestForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestForwarder")
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

fn outbound_uri(target: &BackendTarget, inbound: &Uri) -> Result<Uri, ForwardError> {
    let path_and_query = inbound
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");

    Uri::builder()
        .scheme(target.scheme.clone())
        .authority(target.authority.clone())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ForwardError::InvalidTarget(e.to_string()))
}

fn outbound_headers(request: &GatewayRequest) -> HeaderMap {
    let mut headers = request.headers.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(header::HOST);
    headers.remove(X_USER_ID);
    headers.remove(X_USER_SCOPES);

    if let Ok(value) = HeaderValue::from_str(&request.request_id) {
        headers.insert(X_REQUEST_ID, value);
    }
    if let Some(addr) = request.client_addr {
        append_forwarded_for(&mut headers, addr);
    }
    if let Some(identity) = request.identity() {
        if let Ok(value) = HeaderValue::from_str(identity.subject()) {
            headers.insert(X_USER_ID, value);
        }
        let scopes = identity.scopes().collect::<Vec<_>>().join(" ");
        if let Ok(value) = HeaderValue::from_str(&scopes) {
            headers.insert(X_USER_SCOPES, value);
        }
    }
    headers
}

fn build_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> Request<Body> {
    let mut request = Request::new(Body::from(body));
    *request.method_mut() = method.clone();
    *request.uri_mut() = uri.clone();
    *request.headers_mut() = headers.clone();
    request
}
