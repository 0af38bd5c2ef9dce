//! Multi-key stable sorting
//!
//! Keys compare lexicographically. Absent and `null` values sort first; every
//! other key value in one column must be of a single ordered kind, otherwise
//! the sort fails rather than inventing an order.

use serde_json::Value;
use std::cmp::Ordering;

use crate::record::{compare_scalars, resolve, Path, Resolved, ValueKind};

use super::error::{QueryError, QueryResult};

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// Parse `1`/`-1` or `asc`/`desc`
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => match n.as_i64()? {
                1 => Some(Self::Ascending),
                -1 => Some(Self::Descending),
                _ => None,
            },
            Value::String(s) => match s.to_lowercase().as_str() {
                "asc" | "ascending" => Some(Self::Ascending),
                "desc" | "descending" => Some(Self::Descending),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One sort column
#[derive(Debug, Clone, PartialEq)]
pub struct SortKey {
    pub field: Path,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: Path) -> Self {
        Self {
            field,
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(field: Path) -> Self {
        Self {
            field,
            direction: SortDirection::Descending,
        }
    }
}

/// Ordered list of sort columns
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortSpec {
    pub keys: Vec<SortKey>,
}

impl SortSpec {
    pub fn new(keys: Vec<SortKey>) -> Self {
        Self { keys }
    }

    /// Ascending on a single path
    pub fn by(field: Path) -> Self {
        Self::new(vec![SortKey::asc(field)])
    }

    /// Add a further key
    pub fn then(mut self, field: Path, direction: SortDirection) -> Self {
        self.keys.push(SortKey { field, direction });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parse a path string, a `{field, sort}` object, or an array of either
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(parse_key)
                .collect::<QueryResult<Vec<_>>>()
                .map(Self::new),
            other => Ok(Self::new(vec![parse_key(other)?])),
        }
    }
}

fn parse_key(value: &Value) -> QueryResult<SortKey> {
    match value {
        Value::String(field) => Ok(SortKey::asc(Path::parse(field)?)),
        Value::Object(object) => {
            let field = object
                .get("field")
                .and_then(Value::as_str)
                .ok_or_else(|| QueryError::InvalidQuery(format!("sort key {} needs a 'field'", value)))?;
            let direction = match object.get("sort") {
                None => SortDirection::Ascending,
                Some(d) => SortDirection::from_json(d).ok_or_else(|| {
                    QueryError::InvalidQuery(format!("sort direction must be 1 or -1, got {}", d))
                })?,
            };
            Ok(SortKey {
                field: Path::parse(field)?,
                direction,
            })
        }
        other => Err(QueryError::InvalidQuery(format!("invalid sort key {}", other))),
    }
}

/// Sort `records` by `spec`, keeping ties in input order
pub fn sort(records: Vec<Value>, spec: &SortSpec) -> QueryResult<Vec<Value>> {
    let order = {
        let refs: Vec<&Value> = records.iter().collect();
        sorted_order(&refs, spec)?
    };

    let mut slots: Vec<Option<Value>> = records.into_iter().map(Some).collect();
    Ok(order.into_iter().filter_map(|i| slots[i].take()).collect())
}

/// Stable permutation that orders `records` by `spec`
pub(crate) fn sorted_order(records: &[&Value], spec: &SortSpec) -> QueryResult<Vec<usize>> {
    let keys = extract_keys(records, spec)?;
    let mut order: Vec<usize> = (0..records.len()).collect();

    order.sort_by(|&a, &b| {
        for (column, key) in spec.keys.iter().enumerate() {
            let ordering = compare_keys(keys[a][column], keys[b][column]);
            let ordering = match key.direction {
                SortDirection::Ascending => ordering,
                SortDirection::Descending => ordering.reverse(),
            };
            if ordering.is_ne() {
                return ordering;
            }
        }
        Ordering::Equal
    });

    Ok(order)
}

fn extract_keys<'a>(
    records: &[&'a Value],
    spec: &SortSpec,
) -> QueryResult<Vec<Vec<Option<&'a Value>>>> {
    let mut kinds: Vec<Option<ValueKind>> = vec![None; spec.keys.len()];
    let mut keys = Vec::with_capacity(records.len());

    for &record in records {
        let mut row = Vec::with_capacity(spec.keys.len());
        for (column, key) in spec.keys.iter().enumerate() {
            let value = match resolve(record, &key.field) {
                Resolved::Absent => None,
                Resolved::Value(v) if v.is_null() => None,
                Resolved::Value(v) => Some(v),
                Resolved::Nested { column: array, .. } => {
                    return Err(QueryError::Comparison(format!(
                        "sort key '{}' crosses array field '{}'",
                        key.field, array
                    )))
                }
            };

            if let Some(v) = value {
                let kind = ValueKind::of(v);
                if !kind.is_ordered() {
                    return Err(QueryError::Comparison(format!(
                        "cannot order {} values of sort key '{}'",
                        kind, key.field
                    )));
                }
                match kinds[column] {
                    Some(seen) if seen != kind => {
                        return Err(QueryError::Comparison(format!(
                            "sort key '{}' mixes {} and {} values",
                            key.field, seen, kind
                        )))
                    }
                    _ => kinds[column] = Some(kind),
                }
            }
            row.push(value);
        }
        keys.push(row);
    }

    Ok(keys)
}

fn compare_keys(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_scalars(a, b).unwrap_or(Ordering::Equal),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_stable_sort() {
        let data = vec![
            json!({"k": 2, "i": 0}),
            json!({"k": 1, "i": 1}),
            json!({"k": 2, "i": 2}),
        ];
        let sorted = sort(data, &SortSpec::by(path("k"))).unwrap();
        assert_eq!(
            sorted,
            vec![
                json!({"k": 1, "i": 1}),
                json!({"k": 2, "i": 0}),
                json!({"k": 2, "i": 2}),
            ]
        );
    }

    #[test]
    fn test_multi_key_with_direction() {
        let data = vec![
            json!({"g": "a", "n": 1}),
            json!({"g": "b", "n": 5}),
            json!({"g": "a", "n": 3}),
        ];
        let spec = SortSpec::from_json(&json!([
            {"field": "g", "sort": 1},
            {"field": "n", "sort": -1}
        ]))
        .unwrap();
        assert_eq!(
            spec,
            SortSpec::by(path("g")).then(path("n"), SortDirection::Descending)
        );

        let sorted = sort(data, &spec).unwrap();
        let n: Vec<_> = sorted.iter().map(|r| r["n"].clone()).collect();
        assert_eq!(n, vec![json!(3), json!(1), json!(5)]);
    }

    #[test]
    fn test_absent_sorts_first() {
        let data = vec![json!({"k": 1}), json!({}), json!({"k": null}), json!({"k": 0})];
        let sorted = sort(data, &SortSpec::by(path("k"))).unwrap();
        assert_eq!(
            sorted,
            vec![json!({}), json!({"k": null}), json!({"k": 0}), json!({"k": 1})]
        );
    }

    #[test]
    fn test_mixed_kinds_fail() {
        let data = vec![json!({"k": 1}), json!({"k": "x"})];
        let err = sort(data, &SortSpec::by(path("k"))).unwrap_err();
        assert!(matches!(err, QueryError::Comparison(_)));

        let data = vec![json!({"k": {"a": 1}})];
        assert!(sort(data, &SortSpec::by(path("k"))).is_err());
    }

    #[test]
    fn test_parse_specs() {
        assert_eq!(SortSpec::from_json(&json!("a.b")).unwrap(), SortSpec::by(path("a.b")));
        assert_eq!(
            SortSpec::from_json(&json!({"field": "x", "sort": "desc"})).unwrap(),
            SortSpec::new(vec![SortKey::desc(path("x"))])
        );
        assert!(SortSpec::from_json(&json!({"field": "x", "sort": 2})).is_err());
        assert!(SortSpec::from_json(&json!(3)).is_err());
    }
}
