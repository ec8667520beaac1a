//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, request ID and trace layers)
//!     → request.rs (buffer body, build GatewayRequest)
//!     → pipeline (auth, routing, forwarding)
//!     → response.rs (relay backend response or render error)
//!     → Send to client
//! ```

pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{BodyStream, GatewayRequest, MakeRequestUuid, RawBody, X_REQUEST_ID};
pub use response::{ForwardedResponse, GatewayResult};
pub use server::{build_router, AppState, HttpServer, ReloadHandle, HEALTH_STATUS};
