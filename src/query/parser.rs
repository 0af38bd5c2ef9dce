//! Query Parser
//!
//! Turns a JSON query description into a [`Query`].
//!
//! # Supported Keys
//!
//! ```text
//! {
//!   "from":   [records…] | {nested query},
//!   "window": {window} | [{window}, …],
//!   "where":  {predicate},
//!   "sort":   "path" | {"field": "path", "sort": 1|-1} | [ … ],
//!   "select": "path" | ["path", …]
//! }
//! ```
//!
//! `edges` is rejected outright, as are `filter` and `esfilter` (use
//! `where`). Other unknown keys are ignored with a warning, or rejected in
//! strict mode.

use serde_json::Value;

use crate::query::ast::{Query, Selection, Source};
use crate::query::error::{QueryError, QueryResult};
use crate::query::predicate::Predicate;
use crate::query::sort::SortSpec;
use crate::query::window::WindowSpec;
use crate::record::Path;

/// Parse a query description, warning about unknown keys
pub fn parse_query(input: &Value) -> QueryResult<Query> {
    parse_query_with(input, false)
}

/// Parse a query description from JSON text
pub fn parse_query_str(input: &str) -> QueryResult<Query> {
    let value: Value = serde_json::from_str(input)
        .map_err(|e| QueryError::InvalidQuery(format!("query is not valid JSON: {}", e)))?;
    parse_query(&value)
}

/// Parse a query description; `strict` turns unknown keys into errors
pub fn parse_query_with(input: &Value, strict: bool) -> QueryResult<Query> {
    let object = input
        .as_object()
        .ok_or_else(|| QueryError::InvalidQuery(format!("query must be an object, got {}", input)))?;

    for key in object.keys() {
        match key.as_str() {
            "from" | "where" | "sort" | "select" | "window" => {}
            "edges" => {
                return Err(QueryError::UnsupportedClause(
                    "'edges' is not supported by this engine".to_string(),
                ))
            }
            "filter" | "esfilter" => {
                return Err(QueryError::UnsupportedClause(format!(
                    "'{}' is not supported, use 'where' clause",
                    key
                )))
            }
            other if strict => {
                return Err(QueryError::UnsupportedClause(format!("unknown query key '{}'", other)))
            }
            other => tracing::warn!(key = other, "ignoring unknown query key"),
        }
    }

    let from = match object.get("from") {
        None | Some(Value::Null) => Source::Records(Vec::new()),
        Some(Value::Array(records)) => Source::Records(records.clone()),
        Some(nested @ Value::Object(_)) => Source::Query(Box::new(parse_query_with(nested, strict)?)),
        Some(other) => {
            return Err(QueryError::InvalidQuery(format!(
                "'from' must be an array of records or a query, got {}",
                other
            )))
        }
    };

    let window = match object.get("window") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(specs)) => specs
            .iter()
            .map(WindowSpec::from_json)
            .collect::<QueryResult<Vec<_>>>()?,
        Some(spec) => vec![WindowSpec::from_json(spec)?],
    };

    let where_ = match object.get("where") {
        None | Some(Value::Null) => None,
        Some(p) => Some(Predicate::from_json(p)?),
    };

    let sort = match object.get("sort") {
        None | Some(Value::Null) => None,
        Some(s) => Some(SortSpec::from_json(s)?),
    };

    let select = match object.get("select") {
        None | Some(Value::Null) => None,
        Some(s) => Some(parse_selection(s)?),
    };

    Ok(Query {
        from,
        window,
        where_,
        sort,
        select,
    })
}

fn parse_selection(value: &Value) -> QueryResult<Selection> {
    match value {
        Value::String(path) => Ok(Selection::Single(Path::parse(path)?)),
        Value::Array(paths) => paths
            .iter()
            .map(|p| {
                p.as_str()
                    .ok_or_else(|| QueryError::InvalidQuery(format!("select expects paths, got {}", p)))
                    .and_then(Path::parse)
            })
            .collect::<QueryResult<Vec<_>>>()
            .map(Selection::Many),
        other => Err(QueryError::InvalidQuery(format!(
            "select expects a path or a list of paths, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_full_query() {
        let query = parse_query(&json!({
            "from": [{"a": 1}],
            "window": {"name": "n", "value": {"rownum": true}},
            "where": {"term": {"a": 1}},
            "sort": [{"field": "a", "sort": -1}],
            "select": ["a", "n"]
        }))
        .unwrap();

        assert!(matches!(query.from, Source::Records(ref r) if r.len() == 1));
        assert_eq!(query.window.len(), 1);
        assert!(query.where_.is_some());
        assert_eq!(query.sort.map(|s| s.keys.len()), Some(1));
        assert!(matches!(query.select, Some(Selection::Many(ref p)) if p.len() == 2));
    }

    #[test]
    fn test_parse_minimal_query() {
        let query = parse_query(&json!({})).unwrap();
        assert!(matches!(query.from, Source::Records(ref r) if r.is_empty()));
        assert!(query.where_.is_none() && query.sort.is_none() && query.select.is_none());
    }

    #[test]
    fn test_parse_nested_from() {
        let query = parse_query(&json!({
            "from": {"from": [{"a": 1}], "select": "a"},
            "sort": "a"
        }))
        .unwrap();
        match query.from {
            Source::Query(inner) => {
                assert_eq!(inner.select, Some(Selection::Single(Path::parse("a").unwrap())))
            }
            other => panic!("expected nested query, got {:?}", other),
        }
    }

    #[test]
    fn test_edges_rejected() {
        let err = parse_query(&json!({"edges": ["a"]})).unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedClause(_)));
    }

    #[test]
    fn test_filter_keys_redirect_to_where() {
        for key in ["filter", "esfilter"] {
            let err = parse_query(&json!({ key: {"term": {"a": 1}} })).unwrap_err();
            assert!(err.to_string().contains("use 'where' clause"));
        }
    }

    #[test]
    fn test_unknown_keys() {
        assert!(parse_query(&json!({"limit": 3})).is_ok());
        assert!(parse_query_with(&json!({"limit": 3}), true).is_err());
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_query(&json!([1])).is_err());
        assert!(parse_query(&json!({"from": "table"})).is_err());
        assert!(parse_query(&json!({"select": 3})).is_err());
        assert!(matches!(
            parse_query(&json!({"where": {"like": {"a": "x"}}})).unwrap_err(),
            QueryError::UnsupportedPredicate(_)
        ));
        assert!(parse_query_str("{not json").is_err());
    }
}
