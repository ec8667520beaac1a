//! Route rules and the routing table.
//!
//! # Responsibilities
//! - Compile `RouteConfig` entries into `RouteRule`s
//! - Order rules by specificity once, at table construction
//!
//! # Design Decisions
//! - A table is never mutated after construction; reload builds a new one
//! - Sorting is stable, so equal-specificity rules keep declaration order

use std::str::FromStr;
use std::time::Duration;

use axum::http::uri::Authority;
use axum::http::Method;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::RouteConfig;
use crate::registry::parse_authority;
use crate::routing::matcher::{BodyMatcher, PathPattern, PatternError, Specificity};

/// Default per-attempt backend budget for rules built in code.
pub const DEFAULT_ROUTE_TIMEOUT: Duration = Duration::from_secs(10);

/// Problem found while compiling a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleError {
    #[error("invalid method '{0}'")]
    InvalidMethod(String),

    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("route needs either 'service' or 'address'")]
    MissingTarget,

    #[error("route sets both 'service' and 'address'")]
    AmbiguousTarget,

    #[error("{0}")]
    InvalidAddress(String),

    #[error("timeout must be greater than zero")]
    ZeroTimeout,
}

/// Where a matched request goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// Fixed backend address.
    Address(Authority),
    /// Logical service name, resolved through the registry at match time.
    Service(String),
}

/// One entry of the routing table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub name: String,
    pub method: Method,
    pub pattern: PathPattern,
    pub body: Vec<BodyMatcher>,
    pub target: TargetSpec,
    pub required_scope: Option<String>,
    pub timeout: Duration,
}

impl RouteRule {
    pub fn new(
        name: impl Into<String>,
        method: Method,
        pattern: &str,
        target: TargetSpec,
    ) -> Result<Self, RuleError> {
        Ok(Self {
            name: name.into(),
            method,
            pattern: PathPattern::parse(pattern)?,
            body: Vec::new(),
            target,
            required_scope: None,
            timeout: DEFAULT_ROUTE_TIMEOUT,
        })
    }

    /// Compile a configured route.
    pub fn from_config(config: &RouteConfig, default_timeout: Duration) -> Result<Self, RuleError> {
        let method = Method::from_str(&config.method.to_ascii_uppercase())
            .map_err(|_| RuleError::InvalidMethod(config.method.clone()))?;
        let pattern = PathPattern::parse(&config.path)?;

        let target = match (&config.service, &config.address) {
            (Some(_), Some(_)) => return Err(RuleError::AmbiguousTarget),
            (None, None) => return Err(RuleError::MissingTarget),
            (Some(service), None) => TargetSpec::Service(service.clone()),
            (None, Some(address)) => {
                TargetSpec::Address(parse_authority(address).map_err(RuleError::InvalidAddress)?)
            }
        };

        let timeout = match config.timeout_ms {
            Some(0) => return Err(RuleError::ZeroTimeout),
            Some(ms) => Duration::from_millis(ms),
            None => default_timeout,
        };

        Ok(Self {
            name: config.name.clone(),
            method,
            pattern,
            body: config
                .body
                .iter()
                .map(|(field, value)| BodyMatcher::new(field.clone(), value.clone()))
                .collect(),
            target,
            required_scope: config.required_scope.clone(),
            timeout,
        })
    }

    pub fn with_body_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.body.push(BodyMatcher::new(field, value));
        self
    }

    pub fn with_required_scope(mut self, scope: impl Into<String>) -> Self {
        self.required_scope = Some(scope.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn specificity(&self) -> Specificity {
        self.pattern.specificity()
    }

    /// Method, path and body matchers all agree. Scope is checked separately.
    pub fn matches_request(&self, method: &Method, path: &str, body: &Map<String, Value>) -> bool {
        self.method == *method
            && self.pattern.matches(path)
            && self.body.iter().all(|m| m.matches(body))
    }
}

/// Compile every configured route, failing on the first invalid one.
pub fn compile_routes(
    routes: &[RouteConfig],
    default_timeout: Duration,
) -> Result<Vec<RouteRule>, RuleError> {
    routes
        .iter()
        .map(|r| RouteRule::from_config(r, default_timeout))
        .collect()
}

/// Order rules most specific first; ties keep declaration order.
pub fn sort_rules(rules: &mut [RouteRule]) {
    rules.sort_by(|a, b| {
        b.specificity()
            .cmp(&a.specificity())
            .then_with(|| b.body.len().cmp(&a.body.len()))
    });
}

/// Immutable, specificity-ordered set of rules.
#[derive(Debug, Default)]
pub struct RoutingTable {
    version: u64,
    rules: Vec<RouteRule>,
}

impl RoutingTable {
    /// Sort `rules` into an unversioned table.
    pub fn new(rules: Vec<RouteRule>) -> Self {
        Self::with_version(rules, 0)
    }

    pub(crate) fn with_version(mut rules: Vec<RouteRule>, version: u64) -> Self {
        sort_rules(&mut rules);
        Self { version, rules }
    }

    /// Monotonic reload counter; 0 for tables built outside a resolver.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Rules in match order.
    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
