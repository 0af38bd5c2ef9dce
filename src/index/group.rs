//! Exact-key grouping
//!
//! Groups are keyed by the tuple of [`GroupKey`]s at the grouping paths, so
//! membership is an exact match on kind and value. Group order is first-seen; members keep input order.

use serde_json::{Map, Value};
use std::collections::HashMap;

use crate::record::{get_path, set_path, GroupKey, Path};

/// One group of records sharing a key tuple
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    /// Grouping values, nested by path (`null` where absent)
    pub key: Value,
    pub members: Vec<Value>,
}

/// Key tuple identifying the group `record` belongs to
pub(crate) fn key_tuple(record: &Value, keys: &[Path]) -> Vec<GroupKey> {
    keys.iter()
        .map(|key| GroupKey::of(get_path(record, key)))
        .collect()
}

fn key_object(record: &Value, keys: &[Path]) -> Value {
    let mut key = Value::Object(Map::new());
    for path in keys {
        let value = get_path(record, path).cloned().unwrap_or(Value::Null);
        set_path(&mut key, path, value);
    }
    key
}

/// Partition positions of `records` by `keys`, first-seen group order
pub fn partition<'a, I>(records: I, keys: &[Path]) -> Vec<Vec<usize>>
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut position: HashMap<Vec<GroupKey>, usize> = HashMap::new();
    let mut groups: Vec<Vec<usize>> = Vec::new();

    for (i, record) in records.into_iter().enumerate() {
        let tuple = key_tuple(record, keys);
        let slot = *position.entry(tuple).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(i);
    }

    groups
}

/// Group `records` by exact match on `keys`
pub fn group_by(records: &[Value], keys: &[Path]) -> Vec<Group> {
    partition(records, keys)
        .into_iter()
        .map(|members| Group {
            key: key_object(&records[members[0]], keys),
            members: members.into_iter().map(|i| records[i].clone()).collect(),
        })
        .collect()
}

/// Distinct top-level field names, first-seen order
pub fn columns(records: &[Value]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut names = Vec::new();

    for record in records {
        if let Value::Object(map) = record {
            for name in map.keys() {
                if seen.insert(name.as_str()) {
                    names.push(name.clone());
                }
            }
        }
    }

    names
}

/// Pivot rows into columns: one record per `keys` group, in which each
/// member contributes `member[value]` under the field named by
/// `member[column]`.
pub fn unstack(records: &[Value], keys: &[Path], column: &Path, value: &Path) -> Vec<Value> {
    group_by(records, keys)
        .into_iter()
        .map(|group| {
            let mut row = group.key;
            for member in &group.members {
                let name = GroupKey::of(get_path(member, column)).to_string();
                let cell = get_path(member, value).cloned().unwrap_or(Value::Null);
                set_path(&mut row, &Path::from_segments([name]), cell);
            }
            row
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    #[test]
    fn test_group_by_first_seen_order() {
        let data = vec![
            json!({"k": "b", "i": 0}),
            json!({"k": "a", "i": 1}),
            json!({"k": "b", "i": 2}),
            json!({"i": 3}),
        ];
        let groups = group_by(&data, &[path("k")]);

        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].key, json!({"k": "b"}));
        assert_eq!(groups[0].members, vec![data[0].clone(), data[2].clone()]);
        assert_eq!(groups[1].key, json!({"k": "a"}));
        assert_eq!(groups[2].key, json!({"k": null}));
    }

    #[test]
    fn test_group_partition_property() {
        let data: Vec<Value> = (0..20)
            .map(|i| json!({"a": i % 3, "b": {"c": i % 2}, "i": i}))
            .collect();
        let groups = group_by(&data, &[path("a"), path("b.c")]);

        assert_eq!(groups.len(), 6);
        let total: usize = groups.iter().map(|g| g.members.len()).sum();
        assert_eq!(total, data.len());

        let mut seen: Vec<i64> = groups
            .iter()
            .flat_map(|g| g.members.iter().map(|m| m["i"].as_i64().unwrap()))
            .collect();
        seen.sort();
        assert_eq!(seen, (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_string_and_number_keys_are_distinct_values() {
        let data = vec![
            json!({"k": 1}),
            json!({"k": "1"}),
            json!({"k": null}),
            json!({"k": "null"}),
            json!({"k": 1.0}),
            json!({}),
        ];
        let groups = group_by(&data, &[path("k")]);

        assert_eq!(groups.len(), 4);
        assert_eq!(groups[0].key, json!({"k": 1}));
        assert_eq!(groups[0].members, vec![data[0].clone(), data[4].clone()]);
        assert_eq!(groups[1].key, json!({"k": "1"}));
        assert_eq!(groups[1].members, vec![data[1].clone()]);
        assert_eq!(groups[2].key, json!({"k": null}));
        assert_eq!(groups[2].members, vec![data[2].clone(), data[5].clone()]);
        assert_eq!(groups[3].key, json!({"k": "null"}));
        assert_eq!(groups[3].members, vec![data[3].clone()]);
    }

    #[test]
    fn test_fractional_numbers_stay_apart() {
        let data = vec![json!({"k": 1}), json!({"k": 1.5}), json!({"k": 1})];
        assert_eq!(partition(&data, &[path("k")]), vec![vec![0, 2], vec![1]]);
    }

    #[test]
    fn test_columns() {
        let data = vec![json!({"b": 1, "a": 2}), json!({"c": 3, "a": 4}), json!(5)];
        assert_eq!(columns(&data), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_unstack() {
        let data = vec![
            json!({"day": 1, "metric": "mood", "v": 7}),
            json!({"day": 1, "metric": "sleep", "v": 8}),
            json!({"day": 2, "metric": "mood", "v": 5}),
        ];
        let rows = unstack(&data, &[path("day")], &path("metric"), &path("v"));
        assert_eq!(
            rows,
            vec![
                json!({"day": 1, "mood": 7, "sleep": 8}),
                json!({"day": 2, "mood": 5}),
            ]
        );
    }
}
