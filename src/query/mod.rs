//! Nestquery Query Engine
//!
//! In-memory query execution over nested JSON records:
//!
//! - **Predicate**: closed predicate tree parsed from the JSON DSL
//! - **Filter**: drill-down filtering through nested arrays into a `FlatList`
//! - **Select**: single-path and multi-path projection
//! - **Sort**: stable multi-key ordering
//! - **Window**: partitioned sliding-window aggregation
//! - **Executor**: runs a `Query` through the stages in fixed order
//!
//! # Query Description
//!
//! ```text
//! {
//!   "from":   [records…] | {query},
//!   "window": [{name, edges, sort, value, aggregate, range}],
//!   "where":  {"and": [{"term": {"a": 1}}, {"range": {"b.c": {"gte": 2}}}]},
//!   "sort":   [{"field": "a", "sort": -1}],
//!   "select": ["a", "b.c"]
//! }
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use nestquery::query::{run, Predicate, drill_filter};
//!
//! let rows = run(&json!({"from": data, "where": {"term": {"b.c": 2}}}))?;
//!
//! let predicate = Predicate::from_json(&json!({"term": {"b.c": 2}}))?;
//! let flat = drill_filter(&predicate, &data)?;
//! assert_eq!(flat.path.len() + 1, flat.data[0].len());
//! ```

mod ast;
mod error;
mod executor;
mod filter;
mod parser;
mod predicate;
mod select;
mod sort;
mod window;

pub use ast::{Query, QueryBuilder, Selection, Source};
pub use error::{QueryError, QueryResult};
pub use executor::{run, QueryExecutor, QueryOutput};
pub use filter::{
    drill_filter, drill_filter_with_limit, filter_records, flatten, FlatList, Row,
    DEFAULT_MAX_DEPTH,
};
pub use parser::{parse_query, parse_query_str, parse_query_with};
pub use predicate::{Predicate, RangeOp};
pub use select::{select_fields, select_values};
pub use sort::{sort, SortDirection, SortKey, SortSpec};
pub use window::{
    aggregate, aggregate_names, window, Accumulator, ValueFn, WindowRange, WindowSpec,
    WindowValue,
};
