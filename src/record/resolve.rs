//! Path resolution against nested records
//!
//! Resolution never fails: a missing key, a `null`, or a scalar where an
//! object was expected all resolve to [`Resolved::Absent`].

use serde_json::{Map, Value};

use super::path::Path;

/// Outcome of walking a path through a record
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved<'a> {
    /// Nothing at the path
    Absent,
    /// The path ended on a value (scalar, object, or a terminal array)
    Value(&'a Value),
    /// An intermediate segment holds an array; the caller must drill into
    /// `items` with `rest`
    Nested {
        /// Path from the record to the array field
        column: Path,
        /// Elements of the array
        items: &'a [Value],
        /// Remainder of the path, relative to each element
        rest: Path,
    },
}

/// Resolve `path` against `record`, stopping at the first array-valued
/// intermediate segment.
pub fn resolve<'a>(record: &'a Value, path: &Path) -> Resolved<'a> {
    let segments = path.segments();
    let mut current = record;

    for (i, segment) in segments.iter().enumerate() {
        let next = match current {
            Value::Object(map) => map.get(segment),
            _ => None,
        };

        let next = match next {
            None | Some(Value::Null) => return Resolved::Absent,
            Some(v) => v,
        };

        if i + 1 < segments.len() {
            if let Value::Array(items) = next {
                return Resolved::Nested {
                    column: path.prefix(i + 1),
                    items,
                    rest: path.suffix(i + 1),
                };
            }
        }

        current = next;
    }

    Resolved::Value(current)
}

/// Walk `path` through nested objects only. Arrays are not entered.
pub fn get_path<'a>(record: &'a Value, path: &Path) -> Option<&'a Value> {
    let mut current = record;
    for segment in path.segments() {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        None
    } else {
        Some(current)
    }
}

/// Write `value` at `path`, creating (or replacing non-object) intermediate
/// values with objects as needed.
pub fn set_path(target: &mut Value, path: &Path, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        *target = value;
        return;
    };

    let mut current = target;
    for segment in parents {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else {
            return;
        };
        current = map.entry(segment.clone()).or_insert(Value::Null);
    }

    if !current.is_object() {
        *current = Value::Object(Map::new());
    }
    if let Value::Object(map) = current {
        map.insert(last.clone(), value);
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
    fn test_resolve_scalar() {
        let record = json!({"a": {"b": 5}});
        assert_eq!(resolve(&record, &path("a.b")), Resolved::Value(&json!(5)));
    }

    #[test]
    fn test_resolve_missing_is_absent() {
        let record = json!({"a": {"b": 5}});
        assert_eq!(resolve(&record, &path("a.x")), Resolved::Absent);
        assert_eq!(resolve(&record, &path("z.y.x")), Resolved::Absent);
        assert_eq!(resolve(&record, &path("a.b.c")), Resolved::Absent);
        assert_eq!(resolve(&json!({"a": null}), &path("a")), Resolved::Absent);
    }

    #[test]
    fn test_resolve_nested_array() {
        let record = json!({"a": 1, "b": [{"c": 1}, {"c": 2}]});
        match resolve(&record, &path("b.c")) {
            Resolved::Nested {
                column,
                items,
                rest,
            } => {
                assert_eq!(column, path("b"));
                assert_eq!(items.len(), 2);
                assert_eq!(rest, path("c"));
            }
            other => panic!("expected nested, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_nested_behind_object() {
        let record = json!({"x": {"b": [{"c": 1}]}});
        match resolve(&record, &path("x.b.c")) {
            Resolved::Nested { column, rest, .. } => {
                assert_eq!(column, path("x.b"));
                assert_eq!(rest, path("c"));
            }
            other => panic!("expected nested, got {:?}", other),
        }
    }

    #[test]
    fn test_terminal_array_is_value() {
        let record = json!({"tags": ["a", "b"]});
        assert_eq!(
            resolve(&record, &path("tags")),
            Resolved::Value(&json!(["a", "b"]))
        );
    }

    #[test]
    fn test_get_path_does_not_enter_arrays() {
        let record = json!({"b": [{"c": 1}], "d": {"e": 2}});
        assert_eq!(get_path(&record, &path("d.e")), Some(&json!(2)));
        assert_eq!(get_path(&record, &path("b.c")), None);
        assert_eq!(get_path(&record, &Path::root()), Some(&record));
    }

    #[test]
    fn test_set_path_creates_objects() {
        let mut target = json!({"a": 1});
        set_path(&mut target, &path("b.c"), json!(2));
        set_path(&mut target, &path("a.x"), json!(3));
        assert_eq!(target, json!({"a": {"x": 3}, "b": {"c": 2}}));
    }
}
