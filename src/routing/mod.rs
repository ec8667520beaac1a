//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Authenticated request (method, path, body attributes, identity)
//!     → router.rs (snapshot lookup)
//!     → matcher.rs (evaluate method, path pattern, body fields)
//!     → scope check against identity
//!     → Return: BackendTarget, NoMatch or Forbidden
//!
//! Table Compilation (startup and reload):
//!     RouteConfig[]
//!     → table.rs (compile rules, sort by specificity)
//!     → Freeze as immutable RoutingTable
//!     → Atomic swap into the resolver, paired with a fresh service registry
//! ```
//!
//! # Design Decisions
//! - Tables immutable once built; reload swaps the whole table
//! - No regex in hot path (segment matching only)
//! - Deterministic: same input always matches same route
//! - First match wins (ordered by specificity, then declaration)

pub mod matcher;
pub mod router;
pub mod table;

pub use matcher::{BodyMatcher, PathPattern, PatternError, Specificity};
pub use router::{BackendTarget, ResolveError, RouteLookup, RouteResolver, RoutingSnapshot};
pub use table::{compile_routes, RouteRule, RoutingTable, RuleError, TargetSpec};
