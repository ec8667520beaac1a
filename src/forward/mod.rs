//! Request forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! GatewayRequest + BackendTarget
//!     → forwarder.rs (outbound URI and headers, attempt loop)
//!     → resilience (per-attempt deadline, single retry for GET/HEAD)
//!     → transport.rs (hyper-util client, buffered response)
//!     → GatewayResult
//! ```

pub mod forwarder;
pub mod transport;

pub use forwarder::{ForwardError, Forwarder, RequestForwarder};
pub use transport::{HyperTransport, Transport, TransportError};
