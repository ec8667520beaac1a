//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router (health check plus gateway routes)
//! - Wire up middleware (request ID, tracing)
//! - Assemble the pipeline from configuration
//! - Apply configuration reloads to the routing table and service registry
//! - Serve until shutdown is signalled, reporting the requests left to drain

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::auth::{CredentialValidator, StaticTokenVerifier, TokenVerifier};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::forward::{Forwarder, RequestForwarder};
use crate::http::request::{GatewayRequest, MakeRequestUuid, X_REQUEST_ID};
use crate::lifecycle::InFlight;
use crate::pipeline::Pipeline;
use crate::registry::StaticRegistry;
use crate::routing::{compile_routes, RouteResolver, RuleError};

/// Body of the health check response.
pub const HEALTH_STATUS: &str = "API Gateway is up and running";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub max_body_bytes: usize,
    pub request_timeout: Duration,
    pub in_flight: InFlight,
}

/// Applies reloaded configuration to live routing state.
#[derive(Clone)]
pub struct ReloadHandle {
    resolver: Arc<RouteResolver>,
}

impl ReloadHandle {
    /// Swap in the routes and services of `config`.
    ///
    /// Routes are compiled before anything changes; a bad route leaves the
    /// running configuration untouched. The new table and registry become
    /// visible to resolves in a single swap.
    pub fn apply(&self, config: &GatewayConfig) -> Result<u64, RuleError> {
        let rules = compile_routes(&config.routes, config.timeouts.backend())?;
        let registry = Arc::new(StaticRegistry::from_config(&config.services));
        Ok(self.resolver.load(rules, registry))
    }

    pub fn resolver(&self) -> &Arc<RouteResolver> {
        &self.resolver
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    reload: ReloadHandle,
    in_flight: InFlight,
    config: GatewayConfig,
}

impl HttpServer {
    /// Build a server using the static token verifier from `config.auth`.
    pub fn new(config: GatewayConfig) -> Result<Self, RuleError> {
        let verifier = Arc::new(StaticTokenVerifier::from_config(&config.auth.tokens));
        Self::with_verifier(config, verifier)
    }

    /// Build a server around an injected token verifier.
    pub fn with_verifier(
        config: GatewayConfig,
        verifier: Arc<dyn TokenVerifier>,
    ) -> Result<Self, RuleError> {
        let forwarder: Arc<dyn Forwarder> = Arc::new(RequestForwarder::from_config(&config));
        Self::with_components(config, verifier, forwarder)
    }

    /// Build a server from explicit collaborators.
    pub fn with_components(
        config: GatewayConfig,
        verifier: Arc<dyn TokenVerifier>,
        forwarder: Arc<dyn Forwarder>,
    ) -> Result<Self, RuleError> {
        let registry = Arc::new(StaticRegistry::from_config(&config.services));
        let resolver = Arc::new(RouteResolver::from_config(
            &config.routes,
            config.timeouts.backend(),
            registry,
        )?);

        let pipeline = Pipeline::new(CredentialValidator::new(verifier), resolver.clone(), forwarder);
        let in_flight = InFlight::new();
        let state = AppState {
            pipeline: Arc::new(pipeline),
            max_body_bytes: config.limits.max_body_bytes,
            request_timeout: config.timeouts.request(),
            in_flight: in_flight.clone(),
        };

        Ok(Self {
            router: build_router(state),
            reload: ReloadHandle { resolver },
            in_flight,
            config,
        })
    }

    /// The router, for in-process use (e.g. `tower::ServiceExt::oneshot`).
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn reload_handle(&self) -> ReloadHandle {
        self.reload.clone()
    }

    /// Gateway requests currently inside the pipeline.
    pub fn in_flight(&self) -> InFlight {
        self.in_flight.clone()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` are applied as they
    /// arrive. Returns once `shutdown` fires and in-flight requests drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<GatewayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.config.routes.len(), "HTTP server starting");

        let reload = self.reload.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        let reloader = tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(config) => match reload.apply(&config) {
                            Ok(version) => tracing::info!(version, "Configuration reloaded"),
                            Err(e) => tracing::error!(error = %e, "Reload rejected, keeping current routes"),
                        },
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let draining = self.in_flight.clone();
        let resolver = Arc::clone(self.reload.resolver());
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!(
                    in_flight = draining.count(),
                    table_version = resolver.version(),
                    "Shutdown signal received, draining requests"
                );
            })
            .await?;

        reloader.abort();
        tracing::info!(in_flight = self.in_flight.count(), "HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");
        tracing::info_span!(
            "http",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
        )
    });

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/route", any(gateway_handler))
        .route("/api/{*path}", any(gateway_handler))
        .fallback(fallback_handler)
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(trace)
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": HEALTH_STATUS }))
}

async fn fallback_handler() -> Response {
    GatewayError::NotFound.into_response()
}

/// Runs every API request through the pipeline.
async fn gateway_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let _in_flight = state.in_flight.enter();
    let deadline = Instant::now() + state.request_timeout;
    let client = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);

    let (mut gateway_request, body) = GatewayRequest::from_http(request, state.max_body_bytes, deadline);
    if let Some(addr) = client {
        gateway_request = gateway_request.with_client_addr(addr);
    }

    state
        .pipeline
        .handle_with_body(gateway_request, body)
        .await
        .result
        .into_response()
}
