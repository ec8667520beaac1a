//! Authenticating API gateway library.
//!
//! Every request except the health check passes through the same pipeline:
//! credential validation, route resolution, then forwarding to a backend.

// Core subsystems
pub mod auth;
pub mod config;
pub mod forward;
pub mod http;
pub mod pipeline;
pub mod registry;
pub mod routing;

// Cross-cutting concerns
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::{GatewayOutcome, Pipeline, PipelineState};
