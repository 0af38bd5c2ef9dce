//! Drill-down filtering
//!
//! Filters nested records without materializing the cross product of their
//! arrays. At each depth the predicate is partially evaluated against the
//! fields visible there; only the unresolved residual is carried into the
//! elements of the one array field being drilled into at that depth.
//!
//! # Algorithm
//!
//! ```text
//! record ──evaluate──▶ true     → emit [root … record]
//!                      false    → discard
//!                      residual → recurse into branch[depth] with residual
//! ```
//!
//! After every record has been searched, rows are reconciled to a uniform
//! width: rows that were accepted above the deepest drilled level fan out over
//! the remaining drilled arrays, or are padded with `None` when there is
//! nothing below them.
//!
//! Only one array field may be drilled into per depth across the whole call;
//! a second one fails with [`QueryError::AmbiguousBranch`].

use serde_json::Value;

use crate::record::{get_path, resolve, set_path, Path, Resolved};

use super::error::{QueryError, QueryResult};
use super::predicate::{range_matches, term_matches, terms_matches, Predicate};

/// Default limit on drilled nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Stand-in for the element of an empty drilled array
static ABSENT: Value = Value::Null;

/// One output row: the root record followed by one element per drilled depth.
/// `None` marks a depth with no element.
pub type Row<'a> = Vec<Option<&'a Value>>;

/// Uniform result of a drill filter
#[derive(Debug, Clone, PartialEq)]
pub struct FlatList<'a> {
    /// Drilled array field at each depth, relative to the element above it
    pub path: Vec<Path>,
    /// Rows, each `path.len() + 1` long
    pub data: Vec<Row<'a>>,
}

impl<'a> FlatList<'a> {
    /// Number of rows
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Number of drilled levels
    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn rows(&self) -> impl Iterator<Item = &Row<'a>> {
        self.data.iter()
    }

    /// Merge every row into one record in which each drilled array field is
    /// replaced by that row's single element.
    pub fn to_records(&self) -> Vec<Value> {
        self.data.iter().map(|row| self.merge_row(row)).collect()
    }

    fn merge_row(&self, row: &Row<'a>) -> Value {
        let mut merged = row.first().copied().flatten().cloned().unwrap_or(Value::Null);
        let mut location = Path::root();

        for (depth, column) in self.path.iter().enumerate() {
            location = location.join(column);
            match row.get(depth + 1).copied().flatten() {
                Some(element) => set_path(&mut merged, &location, element.clone()),
                None => {
                    if matches!(get_path(&merged, &location), Some(Value::Array(_))) {
                        set_path(&mut merged, &location, Value::Null);
                    }
                    break;
                }
            }
        }

        merged
    }
}

/// Outcome of partially evaluating a predicate against one record
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Partial {
    True,
    False,
    Residual(Predicate),
}

enum Lookup<'a> {
    /// Path resolved without crossing an array
    Direct(Option<&'a Value>),
    /// Path crosses the drilled array; test the remainder one level down
    Deferred(Path),
}

struct Branch<'a> {
    column: Path,
    items: &'a [Value],
}

/// Branch tracking for one filter call. Grows as deeper levels are drilled
/// and is discarded when the call returns.
struct EvaluationContext<'a> {
    branches: Vec<Branch<'a>>,
    max_depth: usize,
}

impl<'a> EvaluationContext<'a> {
    fn new(max_depth: usize) -> Self {
        Self {
            branches: Vec::new(),
            max_depth,
        }
    }

    fn columns(&self) -> Vec<Path> {
        self.branches.iter().map(|b| b.column.clone()).collect()
    }

    fn items(&self, depth: usize) -> &'a [Value] {
        self.branches.get(depth).map(|b| b.items).unwrap_or(&[])
    }

    fn register(&mut self, depth: usize, column: Path, items: &'a [Value]) -> QueryResult<()> {
        match self.branches.get_mut(depth) {
            Some(branch) if branch.column != column => Err(QueryError::AmbiguousBranch {
                depth,
                existing: branch.column.to_string(),
                requested: column.to_string(),
            }),
            Some(branch) => {
                branch.items = items;
                Ok(())
            }
            None => {
                if depth >= self.max_depth {
                    return Err(QueryError::DepthExceeded {
                        depth: depth + 1,
                        limit: self.max_depth,
                    });
                }
                debug_assert_eq!(depth, self.branches.len());
                tracing::trace!(depth, column = %column, "drilling into nested branch");
                self.branches.push(Branch { column, items });
                Ok(())
            }
        }
    }

    fn lookup(&mut self, record: &'a Value, path: &Path, depth: usize) -> QueryResult<Lookup<'a>> {
        match resolve(record, path) {
            Resolved::Absent => Ok(Lookup::Direct(None)),
            Resolved::Value(v) => Ok(Lookup::Direct(Some(v))),
            Resolved::Nested {
                column,
                items,
                rest,
            } => {
                self.register(depth, column, items)?;
                Ok(Lookup::Deferred(rest))
            }
        }
    }

    /// Partially evaluate `predicate` against `record` at `depth`.
    ///
    /// Every child of `and`/`or` is evaluated before folding so that branch
    /// conflicts surface regardless of sibling outcomes.
    fn evaluate(
        &mut self,
        predicate: &Predicate,
        record: &'a Value,
        depth: usize,
    ) -> QueryResult<Partial> {
        match predicate {
            Predicate::And(children) => {
                let mut result = true;
                let mut residue = Vec::new();
                for child in children {
                    match self.evaluate(child, record, depth)? {
                        Partial::True => {}
                        Partial::False => result = false,
                        Partial::Residual(p) => residue.push(p),
                    }
                }
                Ok(if !result {
                    Partial::False
                } else if residue.is_empty() {
                    Partial::True
                } else {
                    Partial::Residual(Predicate::And(residue))
                })
            }
            Predicate::Or(children) => {
                let mut result = false;
                let mut residue = Vec::new();
                for child in children {
                    match self.evaluate(child, record, depth)? {
                        Partial::True => result = true,
                        Partial::False => {}
                        Partial::Residual(p) => residue.push(p),
                    }
                }
                Ok(if result {
                    Partial::True
                } else if residue.is_empty() {
                    Partial::False
                } else {
                    Partial::Residual(Predicate::Or(residue))
                })
            }
            Predicate::Not(child) => Ok(match self.evaluate(child, record, depth)? {
                Partial::True => Partial::False,
                Partial::False => Partial::True,
                Partial::Residual(p) => Partial::Residual(Predicate::Not(Box::new(p))),
            }),
            Predicate::Term(entries) => {
                self.evaluate_leaf(entries, record, depth, |a, e| term_matches(a, e), Predicate::Term)
            }
            Predicate::Terms(entries) => {
                self.evaluate_leaf(entries, record, depth, |a, e| terms_matches(a, e), Predicate::Terms)
            }
            Predicate::Range(entries) => {
                self.evaluate_leaf(entries, record, depth, |a, b| range_matches(a, b), Predicate::Range)
            }
            Predicate::Missing(path) => Ok(match self.lookup(record, path, depth)? {
                Lookup::Direct(v) => bool_partial(v.is_none()),
                Lookup::Deferred(rest) => Partial::Residual(Predicate::Missing(rest)),
            }),
            Predicate::Exists(path) => Ok(match self.lookup(record, path, depth)? {
                Lookup::Direct(v) => bool_partial(v.is_some()),
                Lookup::Deferred(rest) => Partial::Residual(Predicate::Exists(rest)),
            }),
        }
    }

    fn evaluate_leaf<T: Clone>(
        &mut self,
        entries: &[(Path, T)],
        record: &'a Value,
        depth: usize,
        test: impl Fn(Option<&Value>, &T) -> bool,
        rebuild: fn(Vec<(Path, T)>) -> Predicate,
    ) -> QueryResult<Partial> {
        let mut result = true;
        let mut residue = Vec::new();

        for (path, operand) in entries {
            match self.lookup(record, path, depth)? {
                Lookup::Direct(actual) => {
                    if !test(actual, operand) {
                        result = false;
                    }
                }
                Lookup::Deferred(rest) => residue.push((rest, operand.clone())),
            }
        }

        Ok(if !result {
            Partial::False
        } else if residue.is_empty() {
            Partial::True
        } else {
            Partial::Residual(rebuild(residue))
        })
    }

    fn search(
        &mut self,
        predicate: &Predicate,
        record: &'a Value,
        depth: usize,
        prefix: &mut Row<'a>,
        rows: &mut Vec<Row<'a>>,
    ) -> QueryResult<()> {
        match self.evaluate(predicate, record, depth)? {
            Partial::False => {}
            Partial::True => {
                let mut row = prefix.clone();
                row.push(Some(record));
                rows.push(row);
            }
            Partial::Residual(residual) => {
                let items = self.items(depth);
                prefix.push(Some(record));

                if items.is_empty() {
                    // nothing to drill into; the residual sees an absent element
                    if self.evaluate(&residual, &ABSENT, depth + 1)? == Partial::True {
                        let mut row = prefix.clone();
                        row.push(None);
                        rows.push(row);
                    }
                } else {
                    for item in items {
                        self.search(&residual, item, depth + 1, prefix, rows)?;
                    }
                }

                prefix.pop();
            }
        }
        Ok(())
    }
}

fn bool_partial(b: bool) -> Partial {
    if b {
        Partial::True
    } else {
        Partial::False
    }
}

/// Filter `data` with `predicate`, drilling into nested arrays as needed.
pub fn drill_filter<'a>(predicate: &Predicate, data: &'a [Value]) -> QueryResult<FlatList<'a>> {
    drill_filter_with_limit(predicate, data, DEFAULT_MAX_DEPTH)
}

/// [`drill_filter`] with an explicit nesting limit
pub fn drill_filter_with_limit<'a>(
    predicate: &Predicate,
    data: &'a [Value],
    max_depth: usize,
) -> QueryResult<FlatList<'a>> {
    let mut context = EvaluationContext::new(max_depth);
    let mut rows = Vec::new();
    let mut prefix = Vec::new();

    for record in data {
        context.search(predicate, record, 0, &mut prefix, &mut rows)?;
    }

    let path = context.columns();
    tracing::debug!(
        records = data.len(),
        matched = rows.len(),
        depth = path.len(),
        "drill filter complete"
    );

    let data = reconcile(rows, &path);
    Ok(FlatList { path, data })
}

/// Expand every record along `columns` without filtering. This is the
/// reference flattening that [`drill_filter`] avoids materializing.
pub fn flatten<'a>(data: &'a [Value], columns: &[Path]) -> FlatList<'a> {
    let rows = data.iter().map(|record| vec![Some(record)]).collect();
    FlatList {
        path: columns.to_vec(),
        data: reconcile(rows, columns),
    }
}

/// Evaluate `predicate` against each record independently, without drilling.
/// Paths that cross an array match nothing.
pub fn filter_records(data: &[Value], predicate: &Predicate) -> QueryResult<Vec<Value>> {
    let mut output = Vec::new();
    for record in data {
        if predicate.matches(record)? {
            output.push(record.clone());
        }
    }
    Ok(output)
}

impl Predicate {
    /// Test a single record. A path crossing an array leaves the predicate
    /// unresolved, which counts as no match.
    pub fn matches(&self, record: &Value) -> QueryResult<bool> {
        let mut context = EvaluationContext::new(DEFAULT_MAX_DEPTH);
        Ok(context.evaluate(self, record, 0)? == Partial::True)
    }
}

/// Pad or fan out rows until each is `columns.len() + 1` long
fn reconcile<'a>(rows: Vec<Row<'a>>, columns: &[Path]) -> Vec<Row<'a>> {
    let width = columns.len() + 1;
    let mut uniform = Vec::with_capacity(rows.len());
    let mut stack: Vec<Row<'a>> = Vec::new();

    for row in rows {
        stack.push(row);

        while let Some(mut row) = stack.pop() {
            if row.len() >= width {
                uniform.push(row);
                continue;
            }

            let depth = row.len() - 1;
            let children = row
                .last()
                .copied()
                .flatten()
                .and_then(|parent| get_path(parent, &columns[depth]))
                .and_then(Value::as_array)
                .filter(|items| !items.is_empty());

            match children {
                None => {
                    row.resize(width, None);
                    uniform.push(row);
                }
                Some(items) => {
                    for item in items.iter().rev() {
                        let mut next = row.clone();
                        next.push(Some(item));
                        stack.push(next);
                    }
                }
            }
        }
    }

    uniform
}
