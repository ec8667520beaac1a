//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Hold the current routing table snapshot
//! - Look up the target for a request (method, path, body, identity)
//! - Distinguish "no route" from "forbidden"
//! - Swap in a new table and service registry atomically on reload
//!
//! # Design Decisions
//! - Readers load an `Arc` snapshot through `ArcSwap`, no lock on the hot path
//! - A snapshot pairs the table with the registry its services resolve
//!   through; a resolve never mixes generations
//! - Reloads replace the whole table; rules are never edited in place
//! - Explicit NoMatch rather than silent default

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::uri::{Authority, Scheme};
use axum::http::Method;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::auth::Identity;
use crate::config::RouteConfig;
use crate::observability::metrics;
use crate::registry::BackendRegistry;
use crate::routing::table::{compile_routes, RouteRule, RoutingTable, RuleError, TargetSpec};

/// Resolved destination for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendTarget {
    /// Name of the rule that matched.
    pub route: String,
    pub authority: Authority,
    pub scheme: Scheme,
    /// Budget for a single forward attempt.
    pub timeout: Duration,
}

impl BackendTarget {
    /// Plain-HTTP target for `route` at `authority`.
    pub fn new(route: impl Into<String>, authority: Authority, timeout: Duration) -> Self {
        Self {
            route: route.into(),
            authority,
            scheme: Scheme::HTTP,
            timeout,
        }
    }
}

/// Why no target was produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no route matched")]
    NoMatch,

    #[error("matching route requires a scope the caller lacks")]
    Forbidden,

    #[error("service '{0}' is not registered")]
    UnknownService(String),
}

/// Routing decision seam used by the pipeline.
pub trait RouteLookup: Send + Sync {
    /// Pick the backend for an authenticated request.
    fn resolve(
        &self,
        method: &Method,
        path: &str,
        body: &Map<String, Value>,
        identity: &Identity,
    ) -> Result<BackendTarget, ResolveError>;
}

/// One generation of routing state.
pub struct RoutingSnapshot {
    table: RoutingTable,
    registry: Arc<dyn BackendRegistry>,
}

impl RoutingSnapshot {
    /// Rules of this generation, most specific first.
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Registry that service targets of this generation resolve through.
    pub fn registry(&self) -> &Arc<dyn BackendRegistry> {
        &self.registry
    }

    fn target_for(&self, rule: &RouteRule) -> Result<BackendTarget, ResolveError> {
        let authority = match &rule.target {
            TargetSpec::Address(authority) => authority.clone(),
            TargetSpec::Service(service) => self
                .registry
                .lookup(service)
                .ok_or_else(|| ResolveError::UnknownService(service.clone()))?,
        };
        Ok(BackendTarget::new(rule.name.clone(), authority, rule.timeout))
    }
}

/// Resolves requests against an atomically swappable routing snapshot.
pub struct RouteResolver {
    current: ArcSwap<RoutingSnapshot>,
    reload_lock: Mutex<()>,
}

impl RouteResolver {
    /// Resolver starting at table version 1.
    pub fn new(rules: Vec<RouteRule>, registry: Arc<dyn BackendRegistry>) -> Self {
        let resolver = Self {
            current: ArcSwap::from_pointee(RoutingSnapshot {
                table: RoutingTable::default(),
                registry: Arc::clone(&registry),
            }),
            reload_lock: Mutex::new(()),
        };
        resolver.load(rules, registry);
        resolver
    }

    /// Compile `routes` and build a resolver over them.
    pub fn from_config(
        routes: &[RouteConfig],
        default_timeout: Duration,
        registry: Arc<dyn BackendRegistry>,
    ) -> Result<Self, RuleError> {
        Ok(Self::new(compile_routes(routes, default_timeout)?, registry))
    }

    /// Replace the active table, keeping the current registry.
    /// Returns the new table version.
    pub fn load_table(&self, rules: Vec<RouteRule>) -> u64 {
        self.install(rules, None)
    }

    /// Replace the table and the registry in one swap.
    /// Returns the new table version.
    pub fn load(&self, rules: Vec<RouteRule>, registry: Arc<dyn BackendRegistry>) -> u64 {
        self.install(rules, Some(registry))
    }

    fn install(&self, rules: Vec<RouteRule>, registry: Option<Arc<dyn BackendRegistry>>) -> u64 {
        let _guard = self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let current = self.current.load();
        let version = current.table.version() + 1;
        let registry = registry.unwrap_or_else(|| Arc::clone(&current.registry));
        let table = RoutingTable::with_version(rules, version);
        let rule_count = table.len();

        self.current.store(Arc::new(RoutingSnapshot { table, registry }));

        metrics::record_table_version(version);
        tracing::info!(version, rules = rule_count, "Routing table loaded");
        version
    }

    /// Current routing state. Holding it pins one generation.
    pub fn snapshot(&self) -> Arc<RoutingSnapshot> {
        self.current.load_full()
    }

    /// Version of the active table.
    pub fn version(&self) -> u64 {
        self.current.load().table.version()
    }
}

impl RouteLookup for RouteResolver {
    fn resolve(
        &self,
        method: &Method,
        path: &str,
        body: &Map<String, Value>,
        identity: &Identity,
    ) -> Result<BackendTarget, ResolveError> {
        let snapshot = self.current.load();
        let mut scope_denied = false;

        for rule in snapshot.table.rules() {
            if !rule.matches_request(method, path, body) {
                continue;
            }
            if let Some(scope) = &rule.required_scope {
                if !identity.has_scope(scope) {
                    tracing::debug!(route = %rule.name, scope = %scope, "Route skipped: missing scope");
                    scope_denied = true;
                    continue;
                }
            }
            return snapshot.target_for(rule);
        }

        if scope_denied {
            Err(ResolveError::Forbidden)
        } else {
            Err(ResolveError::NoMatch)
        }
    }
}

impl std::fmt::Debug for RouteResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteResolver")
            .field("version", &self.version())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::VerifiedClaims;
    use crate::registry::StaticRegistry;
    use chrono::Utc;
    use serde_json::json;
    use std::thread;

    fn identity(scopes: &[&str]) -> Identity {
        Identity::from_claims(VerifiedClaims::new(
            "tester",
            scopes.iter().copied(),
            Utc::now() + chrono::Duration::minutes(5),
        ))
    }

    fn addr(a: &str) -> TargetSpec {
        TargetSpec::Address(a.parse().unwrap())
    }

    fn body(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn resolver(rules: Vec<RouteRule>) -> RouteResolver {
        RouteResolver::new(rules, Arc::new(StaticRegistry::new()))
    }

    #[test]
    fn most_specific_rule_wins() {
        let r = resolver(vec![
            RouteRule::new("fallback", Method::POST, "/{*rest}", addr("127.0.0.1:1")).unwrap(),
            RouteRule::new("route", Method::POST, "/api/route", addr("127.0.0.1:2")).unwrap(),
        ]);
        let target = r
            .resolve(&Method::POST, "/api/route", &body(json!({})), &identity(&[]))
            .unwrap();
        assert_eq!(target.route, "route");
        assert_eq!(target.authority.as_str(), "127.0.0.1:2");
    }

    #[test]
    fn method_must_match_exactly() {
        let r = resolver(vec![
            RouteRule::new("post-only", Method::POST, "/api/route", addr("127.0.0.1:1")).unwrap(),
        ]);
        let err = r
            .resolve(&Method::GET, "/api/route", &body(json!({})), &identity(&[]))
            .unwrap_err();
        assert_eq!(err, ResolveError::NoMatch);
    }

    #[test]
    fn body_fields_select_route() {
        let r = resolver(vec![
            RouteRule::new("large", Method::POST, "/api/route", addr("127.0.0.1:1"))
                .unwrap()
                .with_body_field("model", json!("large")),
            RouteRule::new("small", Method::POST, "/api/route", addr("127.0.0.1:2"))
                .unwrap()
                .with_body_field("model", json!("small")),
        ]);
        let id = identity(&[]);

        let small = r
            .resolve(&Method::POST, "/api/route", &body(json!({"model": "small", "x": 1})), &id)
            .unwrap();
        assert_eq!(small.route, "small");

        let none = r
            .resolve(&Method::POST, "/api/route", &body(json!({"key": "value"})), &id)
            .unwrap_err();
        assert_eq!(none, ResolveError::NoMatch);
    }

    #[test]
    fn missing_scope_is_forbidden_not_no_match() {
        let r = resolver(vec![
            RouteRule::new("admin", Method::POST, "/api/admin", addr("127.0.0.1:1"))
                .unwrap()
                .with_required_scope("admin"),
        ]);

        let denied = r
            .resolve(&Method::POST, "/api/admin", &body(json!({})), &identity(&["read"]))
            .unwrap_err();
        assert_eq!(denied, ResolveError::Forbidden);

        let allowed = r
            .resolve(&Method::POST, "/api/admin", &body(json!({})), &identity(&["admin"]))
            .unwrap();
        assert_eq!(allowed.route, "admin");
    }

    #[test]
    fn scoped_rule_skipped_in_favour_of_later_match() {
        let r = resolver(vec![
            RouteRule::new("privileged", Method::POST, "/api/route", addr("127.0.0.1:1"))
                .unwrap()
                .with_required_scope("premium"),
            RouteRule::new("standard", Method::POST, "/api/{*rest}", addr("127.0.0.1:2")).unwrap(),
        ]);
        let target = r
            .resolve(&Method::POST, "/api/route", &body(json!({})), &identity(&[]))
            .unwrap();
        assert_eq!(target.route, "standard");
    }

    #[test]
    fn services_resolve_through_registry() {
        let registry = Arc::new(StaticRegistry::new());
        registry.register("inference", "10.0.0.5:9000".parse().unwrap());
        let r = RouteResolver::new(
            vec![
                RouteRule::new("chat", Method::POST, "/api/chat", TargetSpec::Service("inference".into()))
                    .unwrap(),
                RouteRule::new("ghost", Method::POST, "/api/ghost", TargetSpec::Service("ghost".into()))
                    .unwrap(),
            ],
            registry,
        );
        let id = identity(&[]);

        let target = r.resolve(&Method::POST, "/api/chat", &body(json!({})), &id).unwrap();
        assert_eq!(target.authority.as_str(), "10.0.0.5:9000");

        let err = r.resolve(&Method::POST, "/api/ghost", &body(json!({})), &id).unwrap_err();
        assert_eq!(err, ResolveError::UnknownService("ghost".into()));
    }

    #[test]
    fn declaration_order_does_not_change_resolution() {
        let rules = vec![
            RouteRule::new("wide", Method::GET, "/{*rest}", addr("127.0.0.1:1")).unwrap(),
            RouteRule::new("param", Method::GET, "/items/{id}", addr("127.0.0.1:2")).unwrap(),
            RouteRule::new("exact", Method::GET, "/items/special", addr("127.0.0.1:3")).unwrap(),
        ];
        let mut reversed = rules.clone();
        reversed.reverse();
        let forward = resolver(rules);
        let backward = resolver(reversed);
        let id = identity(&[]);

        for path in ["/items/special", "/items/7", "/other"] {
            let a = forward.resolve(&Method::GET, path, &body(json!({})), &id).unwrap();
            let b = backward.resolve(&Method::GET, path, &body(json!({})), &id).unwrap();
            assert_eq!(a, b, "{path}");
        }
    }

    #[test]
    fn load_table_bumps_version() {
        let r = resolver(Vec::new());
        assert_eq!(r.version(), 1);
        let v = r.load_table(vec![
            RouteRule::new("x", Method::GET, "/x", addr("127.0.0.1:1")).unwrap(),
        ]);
        assert_eq!(v, 2);
        assert_eq!(r.snapshot().table().len(), 1);
    }

    #[test]
    fn concurrent_reads_see_whole_tables() {
        // Every rule of generation N targets port 10_000 + N, so a mixed
        // table would show more than one port.
        fn generation(n: u16) -> Vec<RouteRule> {
            let target = format!("127.0.0.1:{}", 10_000 + n);
            ["/a", "/b", "/c", "/{*rest}"]
                .iter()
                .enumerate()
                .map(|(i, path)| {
                    RouteRule::new(format!("g{n}-{i}"), Method::GET, path, addr(&target)).unwrap()
                })
                .collect()
        }

        let r = Arc::new(resolver(generation(0)));
        let writer = {
            let r = Arc::clone(&r);
            thread::spawn(move || {
                for n in 1..200 {
                    r.load_table(generation(n));
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                thread::spawn(move || {
                    let id = identity(&[]);
                    for _ in 0..500 {
                        let snapshot = r.snapshot();
                        let ports: std::collections::HashSet<_> = snapshot
                            .table()
                            .rules()
                            .iter()
                            .map(|rule| match &rule.target {
                                TargetSpec::Address(a) => a.port_u16(),
                                TargetSpec::Service(_) => None,
                            })
                            .collect();
                        assert_eq!(ports.len(), 1, "table mixed generations");

                        let target = r.resolve(&Method::GET, "/b", &body(json!({})), &id).unwrap();
                        assert!(target.route.ends_with("-1"));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(r.version(), 200);
    }

    #[test]
    fn reload_swaps_table_and_registry_together() {
        // Generation A routes to svc-a and registers only svc-a; generation
        // B likewise for svc-b. A mixed read would surface UnknownService.
        fn generation(service: &str, port: u16) -> (Vec<RouteRule>, Arc<dyn BackendRegistry>) {
            let registry = StaticRegistry::new();
            registry.register(service, format!("127.0.0.1:{port}").parse().unwrap());
            let rules = vec![RouteRule::new(
                service,
                Method::POST,
                "/api/route",
                TargetSpec::Service(service.into()),
            )
            .unwrap()];
            (rules, Arc::new(registry))
        }

        let (rules, registry) = generation("svc-a", 7001);
        let r = Arc::new(RouteResolver::new(rules, registry));
        let writer = {
            let r = Arc::clone(&r);
            thread::spawn(move || {
                for n in 0..2000 {
                    let (rules, registry) = if n % 2 == 0 {
                        generation("svc-b", 7002)
                    } else {
                        generation("svc-a", 7001)
                    };
                    r.load(rules, registry);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let r = Arc::clone(&r);
                thread::spawn(move || {
                    let id = identity(&[]);
                    for _ in 0..2000 {
                        let target = r
                            .resolve(&Method::POST, "/api/route", &body(json!({})), &id)
                            .unwrap();
                        let expected = if target.route == "svc-a" { 7001 } else { 7002 };
                        assert_eq!(target.authority.port_u16(), Some(expected));
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }

    #[test]
    fn load_table_keeps_registry() {
        let registry = Arc::new(StaticRegistry::new());
        registry.register("users", "127.0.0.1:7001".parse().unwrap());
        let r = RouteResolver::new(Vec::new(), registry);
        r.load_table(vec![
            RouteRule::new("users", Method::GET, "/api/users", TargetSpec::Service("users".into()))
                .unwrap(),
        ]);

        let target = r
            .resolve(&Method::GET, "/api/users", &body(json!({})), &identity(&[]))
            .unwrap();
        assert_eq!(target.authority.as_str(), "127.0.0.1:7001");
    }
}
