//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → routing table and service registry swapped wholesale
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Only routes and services are hot-reloadable; the rest needs a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AuthConfig, GatewayConfig, LimitsConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    RetryConfig, RouteConfig, ServiceConfig, TimeoutConfig, TokenConfig,
};
pub use watcher::ConfigWatcher;
