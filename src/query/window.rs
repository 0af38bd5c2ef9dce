//! Sliding-window aggregation
//!
//! Records are partitioned by `edges`, each partition is sorted by `sort`, and
//! `value` is evaluated once per element. An accumulator then slides across
//! the partition so each step costs one `add` and one `subtract`:
//!
//! ```text
//! values:  1   2   3   4   5        range {min: 0, max: 1}, sum
//! i=0     [1   2]                → 3
//! i=1         [2   3]            → 5
//! i=4                     [5]    → 5
//! ```
//!
//! The output is a new collection in input order, each record carrying the
//! result under `name`.

use serde_json::{Map, Number, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::index::partition;
use crate::record::{get_path, set_path, Path};

use super::error::{QueryError, QueryResult};
use super::sort::{sorted_order, SortSpec};

/// Running aggregate that supports removing values as the window slides
pub trait Accumulator {
    fn add(&mut self, value: &Value);
    fn subtract(&mut self, value: &Value);
    fn current(&self) -> Value;
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Value::from(n as i64)
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Default)]
struct Sum {
    total: f64,
}

impl Accumulator for Sum {
    fn add(&mut self, value: &Value) {
        if let Some(n) = value.as_f64() {
            self.total += n;
        }
    }

    fn subtract(&mut self, value: &Value) {
        if let Some(n) = value.as_f64() {
            self.total -= n;
        }
    }

    fn current(&self) -> Value {
        number_value(self.total)
    }
}

/// Counts non-null values
#[derive(Debug, Default)]
struct Count {
    count: u64,
}

impl Accumulator for Count {
    fn add(&mut self, value: &Value) {
        if !value.is_null() {
            self.count += 1;
        }
    }

    fn subtract(&mut self, value: &Value) {
        if !value.is_null() {
            self.count = self.count.saturating_sub(1);
        }
    }

    fn current(&self) -> Value {
        Value::from(self.count)
    }
}

#[derive(Debug, Default)]
struct Average {
    total: f64,
    count: u64,
}

impl Accumulator for Average {
    fn add(&mut self, value: &Value) {
        if let Some(n) = value.as_f64() {
            self.total += n;
            self.count += 1;
        }
    }

    fn subtract(&mut self, value: &Value) {
        if let Some(n) = value.as_f64() {
            self.total -= n;
            self.count = self.count.saturating_sub(1);
        }
    }

    fn current(&self) -> Value {
        if self.count == 0 {
            Value::Null
        } else {
            number_value(self.total / self.count as f64)
        }
    }
}

/// f64 with a total order, for the min/max multiset
#[derive(Debug, Clone, Copy)]
struct Ordered(f64);

impl PartialEq for Ordered {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for Ordered {}

impl PartialOrd for Ordered {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ordered {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Min or max over the window, kept as an ordered multiset so values can be
/// removed again
#[derive(Debug)]
struct Extreme {
    values: BTreeMap<Ordered, usize>,
    max: bool,
}

impl Extreme {
    fn new(max: bool) -> Self {
        Self {
            values: BTreeMap::new(),
            max,
        }
    }
}

impl Accumulator for Extreme {
    fn add(&mut self, value: &Value) {
        if let Some(n) = value.as_f64() {
            *self.values.entry(Ordered(n)).or_insert(0) += 1;
        }
    }

    fn subtract(&mut self, value: &Value) {
        let Some(n) = value.as_f64() else {
            return;
        };
        if let Some(count) = self.values.get_mut(&Ordered(n)) {
            *count -= 1;
            if *count == 0 {
                self.values.remove(&Ordered(n));
            }
        }
    }

    fn current(&self) -> Value {
        let entry = if self.max {
            self.values.keys().next_back()
        } else {
            self.values.keys().next()
        };
        entry.map(|n| number_value(n.0)).unwrap_or(Value::Null)
    }
}

fn new_sum() -> Box<dyn Accumulator> {
    Box::<Sum>::default()
}

fn new_count() -> Box<dyn Accumulator> {
    Box::<Count>::default()
}

fn new_average() -> Box<dyn Accumulator> {
    Box::<Average>::default()
}

fn new_min() -> Box<dyn Accumulator> {
    Box::new(Extreme::new(false))
}

fn new_max() -> Box<dyn Accumulator> {
    Box::new(Extreme::new(true))
}

/// Aggregate kinds available to windows
static AGGREGATES: &[(&str, fn() -> Box<dyn Accumulator>)] = &[
    ("sum", new_sum),
    ("count", new_count),
    ("average", new_average),
    ("avg", new_average),
    ("min", new_min),
    ("max", new_max),
];

/// Look up an aggregate constructor by name
pub fn aggregate(name: &str) -> QueryResult<fn() -> Box<dyn Accumulator>> {
    AGGREGATES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, make)| *make)
        .ok_or_else(|| QueryError::InvalidQuery(format!("unknown aggregate '{}'", name)))
}

/// Names accepted by [`aggregate`]
pub fn aggregate_names() -> impl Iterator<Item = &'static str> {
    AGGREGATES.iter().map(|(n, _)| *n)
}

/// Caller-supplied value function: record, row number, sorted partition
pub type ValueFn = Rc<dyn Fn(&Value, usize, &[&Value]) -> Value>;

/// What each window position aggregates
#[derive(Clone)]
pub enum WindowValue {
    /// Value at a path (`null` when absent)
    Field(Path),
    /// Position within the sorted partition
    RowNumber,
    /// The same value for every record
    Constant(Value),
    Func(ValueFn),
}

impl WindowValue {
    fn evaluate(&self, record: &Value, row: usize, partition: &[&Value]) -> Value {
        match self {
            Self::Field(path) => get_path(record, path).cloned().unwrap_or(Value::Null),
            Self::RowNumber => Value::from(row),
            Self::Constant(v) => v.clone(),
            Self::Func(f) => f(record, row, partition),
        }
    }

    /// `"a.b"` is a field, `{"rownum": true}` the row number, anything else
    /// a constant
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        match value {
            Value::String(path) => Ok(Self::Field(Path::parse(path)?)),
            Value::Object(object) if object.len() == 1 && object.contains_key("rownum") => {
                Ok(Self::RowNumber)
            }
            other => Ok(Self::Constant(other.clone())),
        }
    }
}

impl fmt::Debug for WindowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(path) => f.debug_tuple("Field").field(path).finish(),
            Self::RowNumber => write!(f, "RowNumber"),
            Self::Constant(v) => f.debug_tuple("Constant").field(v).finish(),
            Self::Func(_) => write!(f, "Func(..)"),
        }
    }
}

/// Inclusive relative offsets; a missing side is unbounded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowRange {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl WindowRange {
    pub fn new(min: Option<i64>, max: Option<i64>) -> QueryResult<Self> {
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                return Err(QueryError::InvalidQuery(format!(
                    "window range min {} exceeds max {}",
                    lo, hi
                )));
            }
        }
        Ok(Self { min, max })
    }

    /// Absolute `[start, end)` covered at position `i` of a partition of `len`
    fn bounds(&self, i: usize, len: usize) -> (usize, usize) {
        let clip = |offset: i64| -> usize { (i as i64).saturating_add(offset).clamp(0, len as i64) as usize };
        let start = self.min.map(clip).unwrap_or(0);
        let end = self.max.map(|m| clip(m.saturating_add(1))).unwrap_or(len);
        (start, end.max(start))
    }
}

/// One window column
#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub name: String,
    pub edges: Vec<Path>,
    pub sort: Option<SortSpec>,
    pub value: WindowValue,
    pub aggregate: Option<String>,
    pub range: Option<WindowRange>,
}

impl WindowSpec {
    /// Window writing `value` under `name`, no partitioning or aggregation
    pub fn new(name: impl Into<String>, value: WindowValue) -> Self {
        Self {
            name: name.into(),
            edges: Vec::new(),
            sort: None,
            value,
            aggregate: None,
            range: None,
        }
    }

    pub fn edges(mut self, edges: Vec<Path>) -> Self {
        self.edges = edges;
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn aggregate(mut self, name: impl Into<String>) -> Self {
        self.aggregate = Some(name.into());
        self
    }

    pub fn range(mut self, range: WindowRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Parse `{name, edges, sort, value, aggregate, range}`
    pub fn from_json(value: &Value) -> QueryResult<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| QueryError::InvalidQuery(format!("window must be an object, got {}", value)))?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| QueryError::InvalidQuery("window requires a 'name'".to_string()))?;
        let window_value = match object.get("value") {
            Some(v) => WindowValue::from_json(v)?,
            None => WindowValue::Constant(Value::Null),
        };

        let mut spec = Self::new(name, window_value);

        if let Some(edges) = object.get("edges") {
            spec.edges = parse_paths(edges)?;
        }
        if let Some(sort) = object.get("sort") {
            spec.sort = Some(SortSpec::from_json(sort)?);
        }
        if let Some(name) = object.get("aggregate") {
            let name = name
                .as_str()
                .ok_or_else(|| QueryError::InvalidQuery(format!("aggregate must be a name, got {}", name)))?;
            aggregate(name)?;
            spec.aggregate = Some(name.to_string());
        }
        if let Some(range) = object.get("range") {
            spec.range = Some(parse_range(range)?);
        }

        Ok(spec)
    }

    fn is_plain(&self) -> bool {
        self.aggregate.is_none() && self.sort.is_none() && self.edges.is_empty()
    }
}

fn parse_paths(value: &Value) -> QueryResult<Vec<Path>> {
    match value {
        Value::String(p) => Ok(vec![Path::parse(p)?]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .ok_or_else(|| QueryError::InvalidQuery(format!("expected a path, got {}", item)))
                    .and_then(Path::parse)
            })
            .collect(),
        other => Err(QueryError::InvalidQuery(format!("expected paths, got {}", other))),
    }
}

fn parse_range(value: &Value) -> QueryResult<WindowRange> {
    let object: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| QueryError::InvalidQuery(format!("range must be an object, got {}", value)))?;

    let bound = |key: &str| -> QueryResult<Option<i64>> {
        match object.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_i64()
                .map(Some)
                .ok_or_else(|| QueryError::InvalidQuery(format!("range {} must be an integer, got {}", key, v))),
        }
    };

    WindowRange::new(bound("min")?, bound("max")?)
}

/// Evaluate `spec` over `records`, returning them with `name` set
pub fn window(records: Vec<Value>, spec: &WindowSpec) -> QueryResult<Vec<Value>> {
    let mut results: Vec<Value> = vec![Value::Null; records.len()];

    if spec.is_plain() {
        let all: Vec<&Value> = records.iter().collect();
        for (i, record) in records.iter().enumerate() {
            results[i] = spec.value.evaluate(record, i, &all);
        }
    } else {
        let make = spec.aggregate.as_deref().map(aggregate).transpose()?;
        let groups = partition(&records, &spec.edges);
        tracing::debug!(window = %spec.name, partitions = groups.len(), "evaluating window");

        for members in groups {
            let rows: Vec<&Value> = members.iter().map(|&i| &records[i]).collect();
            let order = match &spec.sort {
                Some(sort) => sorted_order(&rows, sort)?,
                None => (0..rows.len()).collect(),
            };
            let sorted: Vec<&Value> = order.iter().map(|&i| rows[i]).collect();
            let values: Vec<Value> = sorted
                .iter()
                .enumerate()
                .map(|(row, record)| spec.value.evaluate(record, row, &sorted))
                .collect();

            let outputs = match make {
                None => values,
                Some(make) => slide(make(), &values, spec.range.unwrap_or_default()),
            };

            for (position, output) in order.into_iter().zip(outputs) {
                results[members[position]] = output;
            }
        }
    }

    let name = Path::from_segments([spec.name.as_str()]);
    Ok(records
        .into_iter()
        .zip(results)
        .map(|(mut record, result)| {
            set_path(&mut record, &name, result);
            record
        })
        .collect())
}

/// Slide `accumulator` across `values`, adding before subtracting
fn slide(mut accumulator: Box<dyn Accumulator>, values: &[Value], range: WindowRange) -> Vec<Value> {
    let mut output = Vec::with_capacity(values.len());
    let (mut start, mut end) = (0, 0);

    for i in 0..values.len() {
        let (target_start, target_end) = range.bounds(i, values.len());
        while end < target_end {
            accumulator.add(&values[end]);
            end += 1;
        }
        while start < target_start {
            accumulator.subtract(&values[start]);
            start += 1;
        }
        output.push(accumulator.current());
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> Path {
        Path::parse(s).unwrap()
    }

    fn outputs(records: &[Value], name: &str) -> Vec<Value> {
        records.iter().map(|r| r[name].clone()).collect()
    }

    #[test]
    fn test_sliding_sum() {
        let data: Vec<Value> = (1..=5).map(|v| json!({"v": v})).collect();
        let spec = WindowSpec::new("s", WindowValue::Field(path("v")))
            .sort(SortSpec::by(path("v")))
            .aggregate("sum")
            .range(WindowRange::new(Some(0), Some(1)).unwrap());

        let result = window(data, &spec).unwrap();
        assert_eq!(
            outputs(&result, "s"),
            vec![json!(3), json!(5), json!(7), json!(9), json!(5)]
        );
    }

    #[test]
    fn test_trailing_window_and_partitions() {
        let data = vec![
            json!({"g": "a", "t": 2, "v": 10}),
            json!({"g": "b", "t": 1, "v": 1}),
            json!({"g": "a", "t": 1, "v": 20}),
            json!({"g": "a", "t": 3, "v": 30}),
            json!({"g": "b", "t": 2, "v": 2}),
        ];
        let spec = WindowSpec::from_json(&json!({
            "name": "trailing",
            "edges": ["g"],
            "sort": "t",
            "value": "v",
            "aggregate": "sum",
            "range": {"min": -1, "max": 0}
        }))
        .unwrap();

        let result = window(data, &spec).unwrap();
        // input order is kept
        assert_eq!(
            outputs(&result, "trailing"),
            vec![json!(30), json!(1), json!(20), json!(40), json!(3)]
        );
    }

    #[test]
    fn test_whole_partition_without_range() {
        let data = vec![json!({"g": 1, "v": 2}), json!({"g": 2, "v": 5}), json!({"g": 1, "v": 4})];
        let spec = WindowSpec::new("avg", WindowValue::Field(path("v")))
            .edges(vec![path("g")])
            .aggregate("average");

        let result = window(data, &spec).unwrap();
        assert_eq!(outputs(&result, "avg"), vec![json!(3), json!(5), json!(3)]);
    }

    #[test]
    fn test_min_max_slide() {
        let data: Vec<Value> = [3, 1, 4, 1, 5].iter().map(|v| json!({"v": v})).collect();
        let range = WindowRange::new(Some(-1), Some(1)).unwrap();

        let min = WindowSpec::new("m", WindowValue::Field(path("v")))
            .aggregate("min")
            .range(range);
        let result = window(data.clone(), &min).unwrap();
        assert_eq!(
            outputs(&result, "m"),
            vec![json!(1), json!(1), json!(1), json!(1), json!(1)]
        );

        let max = WindowSpec::new("m", WindowValue::Field(path("v")))
            .aggregate("max")
            .range(range);
        let result = window(data, &max).unwrap();
        assert_eq!(
            outputs(&result, "m"),
            vec![json!(3), json!(4), json!(4), json!(5), json!(5)]
        );
    }

    #[test]
    fn test_count_skips_nulls() {
        let data = vec![
            json!({"v": 1}),
            json!({"v": null}),
            json!({"v": 3}),
            json!({}),
            json!({"v": 5}),
        ];
        let spec = WindowSpec::new("n", WindowValue::Field(path("v")))
            .aggregate("count")
            .range(WindowRange::new(Some(-1), Some(1)).unwrap());

        let result = window(data, &spec).unwrap();
        assert_eq!(
            outputs(&result, "n"),
            vec![json!(1), json!(2), json!(1), json!(2), json!(1)]
        );
    }

    #[test]
    fn test_partitions_keep_kinds_apart() {
        let data = vec![json!({"g": 1}), json!({"g": "1"}), json!({"g": 1.0}), json!({"g": null})];
        let spec = WindowSpec::new("n", WindowValue::Constant(json!(1)))
            .edges(vec![path("g")])
            .aggregate("count");

        let result = window(data, &spec).unwrap();
        assert_eq!(outputs(&result, "n"), vec![json!(2), json!(1), json!(2), json!(1)]);
    }

    #[test]
    fn test_field_and_rownum_values() {
        let data = vec![json!({"v": "x"}), json!({"v": "y"})];

        let spec = WindowSpec::new("copy", WindowValue::Field(path("v")));
        let result = window(data.clone(), &spec).unwrap();
        assert_eq!(outputs(&result, "copy"), vec![json!("x"), json!("y")]);

        let spec = WindowSpec::from_json(&json!({
            "name": "rank",
            "value": {"rownum": true},
            "sort": {"field": "v", "sort": -1}
        }))
        .unwrap();
        let result = window(data, &spec).unwrap();
        assert_eq!(outputs(&result, "rank"), vec![json!(1), json!(0)]);
    }

    #[test]
    fn test_custom_value_sees_partition() {
        let data = vec![json!({"v": 1}), json!({"v": 3})];
        let share: ValueFn = Rc::new(|record: &Value, _: usize, partition: &[&Value]| {
            let total: f64 = partition.iter().filter_map(|r| r["v"].as_f64()).sum();
            json!(record["v"].as_f64().unwrap_or(0.0) / total)
        });
        let spec = WindowSpec::new("share", WindowValue::Func(share)).aggregate("sum").range(
            WindowRange::new(Some(0), Some(0)).unwrap(),
        );

        let result = window(data, &spec).unwrap();
        assert_eq!(outputs(&result, "share"), vec![json!(0.25), json!(0.75)]);
    }

    #[test]
    fn test_input_records_untouched() {
        let data = vec![json!({"v": 1})];
        let spec = WindowSpec::new("w", WindowValue::Constant(json!(0)));
        let result = window(data.clone(), &spec).unwrap();

        assert_eq!(data, vec![json!({"v": 1})]);
        assert_eq!(result, vec![json!({"v": 1, "w": 0})]);
    }

    #[test]
    fn test_invalid_windows() {
        assert!(WindowRange::new(Some(2), Some(1)).is_err());
        assert!(aggregate("median").is_err());
        assert!(WindowSpec::from_json(&json!({"value": "v"})).is_err());
        assert!(WindowSpec::from_json(&json!({"name": "w", "aggregate": "median"})).is_err());
        assert!(WindowSpec::from_json(&json!({"name": "w", "range": {"min": 1, "max": 0}})).is_err());
        assert_eq!(aggregate_names().count(), 6);
    }
}
