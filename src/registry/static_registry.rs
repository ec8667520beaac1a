//! Configuration-backed service registry.

use axum::http::uri::Authority;
use dashmap::DashMap;

use crate::config::ServiceConfig;
use crate::registry::{parse_authority, BackendRegistry};

/// Registry populated from `[[services]]`.
///
/// A reload builds a fresh registry and hands it to the resolver together
/// with the new routing table.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    services: DashMap<String, Authority>,
}

impl StaticRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration, skipping entries with unusable addresses.
    pub fn from_config(configs: &[ServiceConfig]) -> Self {
        let registry = Self::new();
        for config in configs {
            match parse_authority(&config.address) {
                Ok(authority) => registry.register(config.name.clone(), authority),
                Err(reason) => {
                    tracing::warn!(service = %config.name, %reason, "Invalid service address");
                }
            }
        }
        registry
    }

    /// Register or overwrite one service.
    pub fn register(&self, name: impl Into<String>, authority: Authority) {
        self.services.insert(name.into(), authority);
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True when no service is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl BackendRegistry for StaticRegistry {
    fn lookup(&self, service: &str) -> Option<Authority> {
        self.services.get(service).map(|entry| entry.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(name: &str, address: &str) -> ServiceConfig {
        ServiceConfig {
            name: name.into(),
            address: address.into(),
        }
    }

    #[test]
    fn lookup_returns_registered_authority() {
        let registry = StaticRegistry::from_config(&[service("users", "127.0.0.1:7001")]);
        assert_eq!(registry.lookup("users").unwrap().as_str(), "127.0.0.1:7001");
        assert!(registry.lookup("orders").is_none());
    }

    #[test]
    fn invalid_entries_are_skipped() {
        let registry = StaticRegistry::from_config(&[
            service("users", "127.0.0.1:7001"),
            service("broken", "ftp://nowhere"),
        ]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn later_entry_overwrites_earlier() {
        let registry = StaticRegistry::from_config(&[
            service("users", "127.0.0.1:7001"),
            service("users", "127.0.0.1:7100"),
        ]);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("users").unwrap().as_str(), "127.0.0.1:7100");
    }
}
