//! Backend registry subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → TargetSpec::Service(name)
//!     → BackendRegistry::lookup(name)
//!     → Authority (host:port) or unknown service
//! ```
//!
//! # Design Decisions
//! - Discovery mechanics live behind the trait; the gateway only looks up
//! - Lookups are synchronous; implementations cache whatever they discover
//! - One address per service (no load balancing)

pub mod static_registry;

use axum::http::uri::Authority;
use url::Url;

pub use static_registry::StaticRegistry;

/// Resolves logical service names to network addresses.
pub trait BackendRegistry: Send + Sync {
    /// Address of `service`, if registered.
    fn lookup(&self, service: &str) -> Option<Authority>;
}

/// Parse "host:port" or "http://host[:port]" into an authority.
pub fn parse_authority(address: &str) -> Result<Authority, String> {
    let candidate = if address.contains("://") {
        address.to_string()
    } else {
        format!("http://{address}")
    };

    let url = Url::parse(&candidate).map_err(|e| format!("invalid address '{address}': {e}"))?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme '{}' in '{address}'", url.scheme()));
    }
    if !matches!(url.path(), "" | "/") || url.query().is_some() {
        return Err(format!("address '{address}' must not carry a path or query"));
    }

    let host = url
        .host_str()
        .ok_or_else(|| format!("address '{address}' has no host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| format!("address '{address}' has no port"))?;

    format!("{host}:{port}")
        .parse::<Authority>()
        .map_err(|e| format!("invalid authority in '{address}': {e}"))
}
