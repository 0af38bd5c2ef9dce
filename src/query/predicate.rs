//! Predicate DSL
//!
//! Predicates arrive as JSON objects with exactly one operator key:
//!
//! ```text
//! {"and": [p, ...]}            {"or": [p, ...]}          {"not": p}
//! {"term": {"a.b": 1}}         {"terms": {"a": [1, 2]}}
//! {"range": {"a": {"gte": 1, "lt": 5}}}
//! {"missing": "a.b"}           {"exists": {"field": "a.b"}}
//! ```
//!
//! Parsing turns them into the closed [`Predicate`] enum; everything after
//! parsing matches exhaustively on it.

use serde_json::{Map, Value};
use std::fmt;

use crate::record::{compare_scalars, values_equal, Path};

use super::error::{QueryError, QueryResult};

/// Comparison operator inside a `range` leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeOp {
    Gt,
    Gte,
    Lt,
    Lte,
}

impl RangeOp {
    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "gt" | ">" => Some(Self::Gt),
            "gte" | ">=" => Some(Self::Gte),
            "lt" | "<" => Some(Self::Lt),
            "lte" | "<=" => Some(Self::Lte),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    /// Test `actual <op> bound`. Values without a common order never match.
    pub fn test(&self, actual: &Value, bound: &Value) -> bool {
        let Some(ordering) = compare_scalars(actual, bound) else {
            return false;
        };
        match self {
            Self::Gt => ordering.is_gt(),
            Self::Gte => ordering.is_ge(),
            Self::Lt => ordering.is_lt(),
            Self::Lte => ordering.is_le(),
        }
    }
}

/// A boolean predicate over nested records
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Every path equals its value
    Term(Vec<(Path, Value)>),
    /// Every path equals one of its values
    Terms(Vec<(Path, Vec<Value>)>),
    /// Every path satisfies all of its bounds
    Range(Vec<(Path, Vec<(RangeOp, Value)>)>),
    Missing(Path),
    Exists(Path),
}

impl Predicate {
    /// Parse the JSON predicate DSL
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| QueryError::UnsupportedPredicate(value.to_string()))?;

        let mut entries = object.iter();
        let (op, arg) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            _ => {
                return Err(QueryError::UnsupportedPredicate(format!(
                    "expected exactly one operator, got {}",
                    value
                )))
            }
        };

        match op.as_str() {
            "and" => Ok(Self::And(parse_children(op, arg)?)),
            "or" => Ok(Self::Or(parse_children(op, arg)?)),
            "not" => Ok(Self::Not(Box::new(Self::from_json(arg)?))),
            "term" => Ok(Self::Term(parse_leaf(op, arg, |_, v| Ok(v.clone()))?)),
            "terms" => Ok(Self::Terms(parse_leaf(op, arg, |path, v| {
                v.as_array().cloned().ok_or_else(|| {
                    QueryError::InvalidQuery(format!("terms on '{}' expects an array", path))
                })
            })?)),
            "range" => Ok(Self::Range(parse_leaf(op, arg, parse_bounds)?)),
            "missing" => Ok(Self::Missing(parse_field(op, arg)?)),
            "exists" => Ok(Self::Exists(parse_field(op, arg)?)),
            _ => Err(QueryError::UnsupportedPredicate(value.to_string())),
        }
    }

    /// Equality leaf on one path
    pub fn term(path: Path, value: Value) -> Self {
        Self::Term(vec![(path, value)])
    }

    /// Range leaf on one path
    pub fn range(path: Path, bounds: Vec<(RangeOp, Value)>) -> Self {
        Self::Range(vec![(path, bounds)])
    }

    /// Render back to the JSON DSL
    pub fn to_json(&self) -> Value {
        let (op, arg) = match self {
            Self::And(children) => ("and", Value::Array(children.iter().map(Self::to_json).collect())),
            Self::Or(children) => ("or", Value::Array(children.iter().map(Self::to_json).collect())),
            Self::Not(child) => ("not", child.to_json()),
            Self::Term(entries) => ("term", leaf_json(entries, |v| v.clone())),
            Self::Terms(entries) => ("terms", leaf_json(entries, |vs| Value::Array(vs.clone()))),
            Self::Range(entries) => (
                "range",
                leaf_json(entries, |bounds| {
                    Value::Object(
                        bounds
                            .iter()
                            .map(|(op, v)| (op.as_str().to_string(), v.clone()))
                            .collect(),
                    )
                }),
            ),
            Self::Missing(path) => ("missing", Value::String(path.to_string())),
            Self::Exists(path) => ("exists", Value::String(path.to_string())),
        };
        let mut object = Map::new();
        object.insert(op.to_string(), arg);
        Value::Object(object)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl TryFrom<&Value> for Predicate {
    type Error = QueryError;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        Self::from_json(value)
    }
}

/// `term` leaf test; an absent value only equals an expected `null`
pub(crate) fn term_matches(actual: Option<&Value>, expected: &Value) -> bool {
    match actual {
        Some(actual) => values_equal(actual, expected),
        None => expected.is_null(),
    }
}

pub(crate) fn terms_matches(actual: Option<&Value>, expected: &[Value]) -> bool {
    expected.iter().any(|e| term_matches(actual, e))
}

/// `range` leaf test; an absent value never satisfies a bound
pub(crate) fn range_matches(actual: Option<&Value>, bounds: &[(RangeOp, Value)]) -> bool {
    match actual {
        Some(actual) => bounds.iter().all(|(op, bound)| op.test(actual, bound)),
        None => false,
    }
}

fn parse_children(op: &str, arg: &Value) -> QueryResult<Vec<Predicate>> {
    arg.as_array()
        .ok_or_else(|| QueryError::InvalidQuery(format!("'{}' expects an array of predicates", op)))?
        .iter()
        .map(Predicate::from_json)
        .collect()
}

fn parse_leaf<T>(
    op: &str,
    arg: &Value,
    operand: impl Fn(&str, &Value) -> QueryResult<T>,
) -> QueryResult<Vec<(Path, T)>> {
    let object = arg
        .as_object()
        .ok_or_else(|| QueryError::InvalidQuery(format!("'{}' expects an object of paths", op)))?;

    object
        .iter()
        .map(|(path, v)| Ok((Path::parse(path)?, operand(path, v)?)))
        .collect()
}

fn parse_bounds(path: &str, arg: &Value) -> QueryResult<Vec<(RangeOp, Value)>> {
    let object = arg.as_object().ok_or_else(|| {
        QueryError::InvalidQuery(format!("range on '{}' expects an object of bounds", path))
    })?;

    object
        .iter()
        .map(|(op, bound)| {
            RangeOp::from_str(op)
                .map(|op| (op, bound.clone()))
                .ok_or_else(|| {
                    QueryError::InvalidQuery(format!("unknown range operator '{}' on '{}'", op, path))
                })
        })
        .collect()
}

fn parse_field(op: &str, arg: &Value) -> QueryResult<Path> {
    match arg {
        Value::String(path) => Path::parse(path),
        Value::Object(object) => match object.get("field") {
            Some(Value::String(path)) => Path::parse(path),
            _ => Err(QueryError::InvalidQuery(format!(
                "'{}' expects a path or {{\"field\": path}}",
                op
            ))),
        },
        _ => Err(QueryError::InvalidQuery(format!(
            "'{}' expects a path or {{\"field\": path}}",
            op
        ))),
    }
}

fn leaf_json<T>(entries: &[(Path, T)], operand: impl Fn(&T) -> Value) -> Value {
    Value::Object(
        entries
            .iter()
            .map(|(path, v)| (path.to_string(), operand(v)))
            .collect(),
    )
}
