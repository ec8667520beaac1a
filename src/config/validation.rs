//! Configuration validation.
//!
//! Serde handles syntax; this module checks semantics: addresses parse,
//! routes compile, route names are unique, referenced services exist.
//! All errors are collected, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::GatewayConfig;
use crate::registry::parse_authority;
use crate::routing::RouteRule;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid bind address '{0}'")]
    BindAddress(String),

    #[error("invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("{0} must be greater than zero")]
    ZeroValue(&'static str),

    #[error("token for subject '{0}' is empty")]
    EmptyToken(String),

    #[error("service '{name}': {reason}")]
    Service { name: String, reason: String },

    #[error("duplicate service name '{0}'")]
    DuplicateService(String),

    #[error("route '{route}': {reason}")]
    Route { route: String, reason: String },

    #[error("duplicate route name '{0}'")]
    DuplicateRoute(String),

    #[error("route '{route}' references unknown service '{service}'")]
    UnknownService { route: String, service: String },
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if config.timeouts.request_ms == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.request_ms"));
    }
    if config.timeouts.backend_ms == 0 {
        errors.push(ValidationError::ZeroValue("timeouts.backend_ms"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::ZeroValue("limits.max_body_bytes"));
    }

    for token in &config.auth.tokens {
        if token.token.trim().is_empty() {
            errors.push(ValidationError::EmptyToken(token.subject.clone()));
        }
    }

    let mut services = HashSet::new();
    for service in &config.services {
        if !services.insert(service.name.as_str()) {
            errors.push(ValidationError::DuplicateService(service.name.clone()));
        }
        if let Err(reason) = parse_authority(&service.address) {
            errors.push(ValidationError::Service {
                name: service.name.clone(),
                reason,
            });
        }
    }

    let mut routes = HashSet::new();
    for route in &config.routes {
        if !routes.insert(route.name.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.name.clone()));
        }
        if let Err(e) = RouteRule::from_config(route, config.timeouts.backend()) {
            errors.push(ValidationError::Route {
                route: route.name.clone(),
                reason: e.to_string(),
            });
        }
        if let Some(service) = &route.service {
            if !services.contains(service.as_str()) {
                errors.push(ValidationError::UnknownService {
                    route: route.name.clone(),
                    service: service.clone(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
