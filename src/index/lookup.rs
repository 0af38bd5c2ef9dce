//! Key lookup indexes
//!
//! [`Index`] maps a key tuple to every record carrying it; [`UniqueIndex`]
//! insists on exactly one record per key and reports both records when that
//! fails.
//!
//! Both can act as relations over a list of key values: a datum is the key
//! value itself for a single-key index, or an array of values for a
//! multi-key one.

use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::query::{QueryError, QueryResult};
use crate::record::{GroupKey, Path};

use super::group::key_tuple;

fn render_keys(keys: &[Path]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn lookup_tuple(values: &[Value]) -> Vec<GroupKey> {
    values.iter().map(|v| GroupKey::of(Some(v))).collect()
}

fn datum_tuple(datum: &Value, width: usize) -> Option<Vec<GroupKey>> {
    match datum {
        _ if width == 1 => Some(vec![GroupKey::of(Some(datum))]),
        Value::Array(values) if values.len() == width => Some(lookup_tuple(values)),
        _ => None,
    }
}

fn render_tuple(tuple: &[GroupKey]) -> String {
    tuple
        .iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Multi-key index, first-seen key order
#[derive(Debug, Clone)]
pub struct Index {
    keys: Vec<Path>,
    entries: Vec<Vec<Value>>,
    position: HashMap<Vec<GroupKey>, usize>,
}

impl Index {
    /// Index `records` on `keys`
    pub fn build(records: &[Value], keys: &[Path]) -> Self {
        let mut index = Self {
            keys: keys.to_vec(),
            entries: Vec::new(),
            position: HashMap::new(),
        };
        for record in records {
            index.insert(record.clone());
        }
        index
    }

    pub fn insert(&mut self, record: Value) {
        let tuple = key_tuple(&record, &self.keys);
        match self.position.get(&tuple) {
            Some(&i) => self.entries[i].push(record),
            None => {
                self.position.insert(tuple, self.entries.len());
                self.entries.push(vec![record]);
            }
        }
    }

    /// Records whose key values equal `values`, one value per index key
    pub fn get(&self, values: &[Value]) -> &[Value] {
        self.position
            .get(&lookup_tuple(values))
            .map(|&i| self.entries[i].as_slice())
            .unwrap_or(&[])
    }

    pub fn keys(&self) -> &[Path] {
        &self.keys
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups of records, first-seen key order
    pub fn iter(&self) -> impl Iterator<Item = &[Value]> {
        self.entries.iter().map(Vec::as_slice)
    }

    /// Distinct records related to any of `data`, in order of first relation
    pub fn map_to_set(&self, data: &[Value]) -> Vec<Value> {
        let mut seen = HashSet::new();
        let mut output = Vec::new();

        for datum in data {
            let Some(&i) = datum_tuple(datum, self.keys.len()).and_then(|t| self.position.get(&t))
            else {
                continue;
            };
            for record in &self.entries[i] {
                if seen.insert(GroupKey::of(Some(record))) {
                    output.push(record.clone());
                }
            }
        }

        output
    }
}

/// Index with exactly one record per key
#[derive(Debug, Clone)]
pub struct UniqueIndex {
    keys: Vec<Path>,
    entries: Vec<Value>,
    position: HashMap<Vec<GroupKey>, usize>,
}

impl UniqueIndex {
    /// Index `records` on `keys`, failing on the first repeated key
    pub fn build(records: &[Value], keys: &[Path]) -> QueryResult<Self> {
        let mut index = Self {
            keys: keys.to_vec(),
            entries: Vec::new(),
            position: HashMap::new(),
        };
        for record in records {
            index.insert(record.clone())?;
        }
        Ok(index)
    }

    pub fn insert(&mut self, record: Value) -> QueryResult<()> {
        let tuple = key_tuple(&record, &self.keys);
        if let Some(&i) = self.position.get(&tuple) {
            return Err(QueryError::DuplicateKey {
                index: render_keys(&self.keys),
                key: render_tuple(&tuple),
                first: Box::new(self.entries[i].clone()),
                second: Box::new(record),
            });
        }
        self.position.insert(tuple, self.entries.len());
        self.entries.push(record);
        Ok(())
    }

    pub fn get(&self, values: &[Value]) -> Option<&Value> {
        self.position
            .get(&lookup_tuple(values))
            .map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.entries.iter()
    }

    /// The record related to each of `data`, `null` where there is none
    pub fn map(&self, data: &[Value]) -> Vec<Value> {
        data.iter()
            .map(|datum| {
                datum_tuple(datum, self.keys.len())
                    .and_then(|t| self.position.get(&t))
                    .map(|&i| self.entries[i].clone())
                    .unwrap_or(Value::Null)
            })
            .collect()
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
    fn test_index_lookup() {
        let data = vec![
            json!({"k": "x", "n": 1}),
            json!({"k": "y", "n": 2}),
            json!({"k": "x", "n": 3}),
        ];
        let index = Index::build(&data, &[path("k")]);

        assert_eq!(index.len(), 2);
        assert_eq!(index.get(&[json!("x")]), &[data[0].clone(), data[2].clone()]);
        assert!(index.get(&[json!("z")]).is_empty());
    }

    #[test]
    fn test_unique_index() {
        let data = vec![json!({"id": 1, "a": {"b": 2}}), json!({"id": 2})];
        let index = UniqueIndex::build(&data, &[path("id")]).unwrap();

        assert_eq!(index.get(&[json!(2)]), Some(&data[1]));
        assert_eq!(index.get(&[json!(3)]), None);
    }

    #[test]
    fn test_unique_index_duplicate() {
        let data = vec![
            json!({"id": 7, "n": 1}),
            json!({"id": 8, "n": 2}),
            json!({"id": 7, "n": 3}),
        ];
        let err = UniqueIndex::build(&data, &[path("id")]).unwrap_err();

        match err {
            QueryError::DuplicateKey {
                index,
                key,
                first,
                second,
            } => {
                assert_eq!(index, "id");
                assert_eq!(key, "7");
                assert_eq!(*first, data[0]);
                assert_eq!(*second, data[2]);
            }
            other => panic!("expected duplicate key, got {:?}", other),
        }
    }

    #[test]
    fn test_unique_index_keys_by_kind() {
        let data = vec![json!({"id": 7}), json!({"id": "7"}), json!({"id": null})];
        let index = UniqueIndex::build(&data, &[path("id")]).unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.get(&[json!(7)]), Some(&data[0]));
        assert_eq!(index.get(&[json!(7.0)]), Some(&data[0]));
        assert_eq!(index.get(&[json!("7")]), Some(&data[1]));
        assert_eq!(index.get(&[json!(null)]), Some(&data[2]));

        let index = Index::build(&data, &[path("id")]);
        assert_eq!(index.get(&[json!("7")]), &[data[1].clone()]);
    }

    #[test]
    fn test_unique_index_map() {
        let data = vec![json!({"id": 1, "name": "a"}), json!({"id": 2, "name": "b"})];
        let index = UniqueIndex::build(&data, &[path("id")]).unwrap();

        assert_eq!(
            index.map(&[json!(2), json!(3), json!(1)]),
            vec![data[1].clone(), json!(null), data[0].clone()]
        );
    }

    #[test]
    fn test_index_map_to_set() {
        let data = vec![
            json!({"k": "x", "n": 1}),
            json!({"k": "y", "n": 2}),
            json!({"k": "x", "n": 3}),
            json!({"k": "z", "n": 4}),
        ];
        let index = Index::build(&data, &[path("k")]);

        assert_eq!(
            index.map_to_set(&[json!("y"), json!("x"), json!("q"), json!("y")]),
            vec![data[1].clone(), data[0].clone(), data[2].clone()]
        );
    }

    #[test]
    fn test_multi_key_map() {
        let data = vec![json!({"a": 1, "b": "p"}), json!({"a": 1, "b": "q"})];
        let index = UniqueIndex::build(&data, &[path("a"), path("b")]).unwrap();

        assert_eq!(
            index.map(&[json!([1, "q"]), json!(1), json!([1, "r"])]),
            vec![data[1].clone(), json!(null), json!(null)]
        );
    }
}
