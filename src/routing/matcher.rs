//! Route matching logic.
//!
//! # Responsibilities
//! - Match request paths against segment patterns
//! - Rank patterns by specificity
//! - Match declared body fields against JSON attributes
//!
//! # Design Decisions
//! - Path matching is case-sensitive and segment based
//! - Trailing and repeated slashes are ignored
//! - No regex to guarantee O(n) matching
//! - Body matchers only look at declared top-level fields

use serde_json::{Map, Value};
use thiserror::Error;

/// Problem found while parsing a path pattern.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("path pattern must start with '/'")]
    MissingLeadingSlash,

    #[error("catch-all segment must be the last segment")]
    CatchAllNotLast,

    #[error("empty parameter name in segment '{0}'")]
    EmptyParam(String),

    #[error("unbalanced braces in segment '{0}'")]
    Unbalanced(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

impl Segment {
    fn parse(raw: &str) -> Result<Self, PatternError> {
        if let Some(inner) = raw.strip_prefix('{').and_then(|s| s.strip_suffix('}')) {
            let (catch_all, name) = match inner.strip_prefix('*') {
                Some(name) => (true, name),
                None => (false, inner),
            };
            if name.is_empty() {
                return Err(PatternError::EmptyParam(raw.to_string()));
            }
            if name.contains(['{', '}']) {
                return Err(PatternError::Unbalanced(raw.to_string()));
            }
            return Ok(if catch_all {
                Segment::CatchAll(name.to_string())
            } else {
                Segment::Param(name.to_string())
            });
        }

        if raw.contains(['{', '}']) {
            return Err(PatternError::Unbalanced(raw.to_string()));
        }
        Ok(Segment::Literal(raw.to_string()))
    }
}

fn path_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|s| !s.is_empty())
}

/// Ranking key for path patterns. Greater is more specific.
///
/// Fields compare in declaration order: leading literal segments, total
/// literal segments, absence of a catch-all, single-segment parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Specificity {
    literal_prefix: usize,
    literals: usize,
    bounded: bool,
    params: usize,
}

/// A compiled path pattern such as `/api/{version}/models/{*rest}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if !pattern.starts_with('/') {
            return Err(PatternError::MissingLeadingSlash);
        }

        let segments = path_segments(pattern)
            .map(Segment::parse)
            .collect::<Result<Vec<_>, _>>()?;

        let catch_all_pos = segments
            .iter()
            .position(|s| matches!(s, Segment::CatchAll(_)));
        if let Some(pos) = catch_all_pos {
            if pos + 1 != segments.len() {
                return Err(PatternError::CatchAllNotLast);
            }
        }

        Ok(Self {
            raw: pattern.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns true if the request path matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let mut parts = path_segments(path);
        for segment in &self.segments {
            match segment {
                Segment::CatchAll(_) => return true,
                Segment::Literal(literal) => match parts.next() {
                    Some(part) if part == literal => {}
                    _ => return false,
                },
                Segment::Param(_) => {
                    if parts.next().is_none() {
                        return false;
                    }
                }
            }
        }
        parts.next().is_none()
    }

    pub fn specificity(&self) -> Specificity {
        let literal_prefix = self
            .segments
            .iter()
            .take_while(|s| matches!(s, Segment::Literal(_)))
            .count();
        let literals = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Literal(_)))
            .count();
        let params = self
            .segments
            .iter()
            .filter(|s| matches!(s, Segment::Param(_)))
            .count();
        let bounded = !self
            .segments
            .iter()
            .any(|s| matches!(s, Segment::CatchAll(_)));

        Specificity {
            literal_prefix,
            literals,
            bounded,
            params,
        }
    }
}

/// Requires a top-level body field to equal a given JSON value.
#[derive(Debug, Clone, PartialEq)]
pub struct BodyMatcher {
    field: String,
    expected: Value,
}

impl BodyMatcher {
    pub fn new(field: impl Into<String>, expected: Value) -> Self {
        Self {
            field: field.into(),
            expected,
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn matches(&self, attributes: &Map<String, Value>) -> bool {
        attributes
            .get(&self.field)
            .map(|actual| values_equal(actual, &self.expected))
            .unwrap_or(false)
    }
}

/// JSON equality where numbers compare by value (`2` equals `2.0`).
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y || matches!((x.as_f64(), y.as_f64()), (Some(l), Some(r)) if l == r)
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| values_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, l)| y.get(k).map(|r| values_equal(l, r)).unwrap_or(false))
        }
        _ => a == b,
    }
}
