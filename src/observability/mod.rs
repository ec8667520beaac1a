//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, request ID in every span)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Metric recording is a no-op until an exporter is installed
//! - Request ID flows through all subsystems

pub mod logging;
pub mod metrics;

pub use logging::init_logging;
pub use metrics::init_metrics;
