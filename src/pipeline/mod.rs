//! Gateway pipeline.
//!
//! # Data Flow
//! ```text
//! GatewayRequest (Received)
//!     → Authenticating: CredentialValidator under the request deadline
//!     → body read under the request deadline (unauthenticated callers never get here)
//!     → body attributes (JSON object, size limit)
//!     → Routing: RouteLookup
//!     → deadline checkpoint
//!     → Forwarding: Forwarder
//!     → Completed | Rejected
//! ```
//!
//! # Design Decisions
//! - Stages run strictly in order; a failed stage short-circuits the rest
//! - Unauthenticated requests never reach routing or a backend
//! - A panic in any stage becomes a 500 for that request only

pub mod state;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::time::{timeout_at, Instant};
use tracing::Instrument;

use crate::auth::CredentialValidator;
use crate::error::GatewayError;
use crate::forward::Forwarder;
use crate::http::{BodyStream, GatewayRequest, GatewayResult};
use crate::observability::metrics;
use crate::routing::RouteLookup;

pub use state::{PipelineState, StateTrace};

/// Result of one pipeline run plus the states it passed through.
#[derive(Debug)]
pub struct GatewayOutcome {
    pub result: GatewayResult,
    pub states: Vec<PipelineState>,
}

/// Orchestrates validation, routing and forwarding for each request.
pub struct Pipeline {
    validator: CredentialValidator,
    lookup: Arc<dyn RouteLookup>,
    forwarder: Arc<dyn Forwarder>,
}

impl Pipeline {
    pub fn new(
        validator: CredentialValidator,
        lookup: Arc<dyn RouteLookup>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            validator,
            lookup,
            forwarder,
        }
    }

    /// Run a request whose body is already buffered in `request.body`.
    pub async fn handle(&self, request: GatewayRequest) -> GatewayOutcome {
        self.process(request, None).await
    }

    /// Run a request whose body is still on the wire. The body is read only
    /// once the caller is authenticated.
    pub async fn handle_with_body(&self, request: GatewayRequest, body: BodyStream) -> GatewayOutcome {
        self.process(request, Some(body)).await
    }

    /// Run one request to its terminal state. Never panics.
    async fn process(&self, request: GatewayRequest, body: Option<BodyStream>) -> GatewayOutcome {
        let started = std::time::Instant::now();
        let method = request.method.clone();
        let span = tracing::info_span!(
            "request",
            request_id = %request.request_id,
            method = %request.method,
            path = %request.path(),
        );

        let mut trace = StateTrace::new();
        let caught = AssertUnwindSafe(self.run(request, body, &mut trace).instrument(span.clone()))
            .catch_unwind()
            .await;

        let result = match caught {
            Ok(result) => result,
            Err(payload) => {
                let detail = panic_message(payload.as_ref());
                span.in_scope(|| {
                    tracing::error!(stage = %trace.current(), panic = %detail, "Pipeline stage panicked");
                });
                trace.enter(PipelineState::Rejected);
                GatewayResult::Rejected(GatewayError::Internal(format!(
                    "panic during {}: {detail}",
                    trace.current()
                )))
            }
        };

        let status = result.status();
        metrics::record_request(method.as_str(), status.as_u16(), result.kind(), started);
        span.in_scope(|| {
            tracing::info!(
                status = status.as_u16(),
                kind = result.kind(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Request finished"
            );
        });

        GatewayOutcome {
            result,
            states: trace.into_states(),
        }
    }

    async fn run(
        &self,
        mut request: GatewayRequest,
        body: Option<BodyStream>,
        trace: &mut StateTrace,
    ) -> GatewayResult {
        trace.enter(PipelineState::Authenticating);
        let identity = match timeout_at(
            request.deadline,
            self.validator.validate(request.authorization()),
        )
        .await
        {
            Ok(Ok(identity)) => identity,
            Ok(Err(err)) => {
                tracing::info!(error = %err, "Authentication failed");
                return reject(trace, err.into());
            }
            Err(_) => return reject(trace, GatewayError::DeadlineExceeded),
        };

        if let Some(stream) = body {
            match timeout_at(request.deadline, stream.read()).await {
                Ok(raw) => request.body = raw,
                Err(_) => {
                    tracing::info!("Request body not received before deadline");
                    return reject(trace, GatewayError::DeadlineExceeded);
                }
            }
        }

        let body = match request.body_attributes() {
            Ok(body) => body,
            Err(err) => return reject(trace, err),
        };

        trace.enter(PipelineState::Routing);
        let target = match self
            .lookup
            .resolve(&request.method, request.path(), &body, &identity)
        {
            Ok(target) => target,
            Err(err) => {
                tracing::info!(error = %err, subject = %identity.subject(), "Routing rejected request");
                return reject(trace, err.into());
            }
        };
        tracing::debug!(route = %target.route, backend = %target.authority, "Route matched");

        request.set_identity(identity);
        request.set_target(target.clone());

        if Instant::now() >= request.deadline {
            return reject(trace, GatewayError::DeadlineExceeded);
        }

        trace.enter(PipelineState::Forwarding);
        let result = self.forwarder.forward(&target, &request).await;
        trace.enter(match result {
            GatewayResult::Forwarded(_) => PipelineState::Completed,
            GatewayResult::Rejected(_) => PipelineState::Rejected,
        });
        result
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").finish_non_exhaustive()
    }
}

fn reject(trace: &mut StateTrace, err: GatewayError) -> GatewayResult {
    trace.enter(PipelineState::Rejected);
    GatewayResult::Rejected(err)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
