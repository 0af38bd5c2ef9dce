//! Projection
//!
//! Single-path projection flattens every value reachable at a path, crossing
//! arrays as it goes. Multi-path projection builds one output object per
//! record (or per element of the one nested array it drills into), copying
//! the scalar fields into every fanned-out row.

use serde_json::{Map, Value};

use crate::record::{resolve, set_path, Path, Resolved};

use super::error::{QueryError, QueryResult};
use super::filter::FlatList;

/// All values at `path`, outer records first, children contiguous.
/// Absent values project to `null`; empty nested arrays contribute nothing.
pub fn select_values(records: &[Value], path: &Path) -> Vec<Value> {
    let mut output = Vec::with_capacity(records.len());
    collect_values(records, path, &mut output);
    output
}

fn collect_values(records: &[Value], path: &Path, output: &mut Vec<Value>) {
    for record in records {
        match resolve(record, path) {
            Resolved::Absent => output.push(Value::Null),
            Resolved::Value(v) => output.push(v.clone()),
            Resolved::Nested { items, rest, .. } => collect_values(items, &rest, output),
        }
    }
}

/// Project several paths at once, one output object per record, or per
/// element of the nested array the paths drill into.
pub fn select_fields(records: &[Value], paths: &[Path]) -> QueryResult<Vec<Value>> {
    let mut output = Vec::with_capacity(records.len());
    project(records, paths, 0, &mut output)?;
    Ok(output)
}

/// Nested array deferred to the next level for one record
struct Deep<'a> {
    column: Path,
    items: &'a [Value],
    rest: Vec<Path>,
}

fn project(
    records: &[Value],
    paths: &[Path],
    depth: usize,
    output: &mut Vec<Value>,
) -> QueryResult<()> {
    for record in records {
        let mut template = Value::Object(Map::new());
        let mut deep: Option<Deep<'_>> = None;

        for path in paths {
            match resolve(record, path) {
                Resolved::Absent => {}
                Resolved::Value(v) => set_path(&mut template, path, v.clone()),
                Resolved::Nested {
                    column,
                    items,
                    rest,
                } => match deep.as_mut() {
                    Some(slot) if slot.column != column => {
                        return Err(QueryError::AmbiguousBranch {
                            depth,
                            existing: slot.column.to_string(),
                            requested: column.to_string(),
                        });
                    }
                    Some(slot) => slot.rest.push(rest),
                    None => {
                        deep = Some(Deep {
                            column,
                            items,
                            rest: vec![rest],
                        })
                    }
                },
            }
        }

        let Some(deep) = deep else {
            output.push(template);
            continue;
        };

        let mut children = Vec::new();
        project(deep.items, &deep.rest, depth + 1, &mut children)?;

        if children.is_empty() {
            output.push(template);
            continue;
        }
        for child in children {
            let mut row = template.clone();
            set_path(&mut row, &deep.column, child);
            output.push(row);
        }
    }
    Ok(())
}

impl<'a> FlatList<'a> {
    /// Project `path` from every row. Leading segments that name the drilled
    /// columns are read from the matching row element instead of the root.
    pub fn select(&self, path: &Path) -> Vec<Value> {
        let mut depth = 0;
        let mut rest = path.clone();

        for column in &self.path {
            match rest.strip_prefix(column) {
                Some(remainder) => {
                    rest = remainder;
                    depth += 1;
                }
                None => break,
            }
        }

        self.data
            .iter()
            .map(|row| match row.get(depth).copied().flatten() {
                None => Value::Null,
                Some(element) => match resolve(element, &rest) {
                    Resolved::Absent => Value::Null,
                    Resolved::Value(v) => v.clone(),
                    Resolved::Nested { items, rest, .. } => {
                        Value::Array(select_values(items, &rest))
                    }
                },
            })
            .collect()
    }
}
