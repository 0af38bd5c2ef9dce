//! # Nestquery
//!
//! In-memory query execution over nested JSON documents.
//!
//! ## Features
//!
//! - **Drill-down filtering**: predicates are pushed down level by level into
//!   nested arrays instead of flattening every record up front
//! - **Projection**: flat or nested-joined output rows
//! - **Grouping & chunking**: exact-key groups, indexes, weight-bounded chunks
//! - **Sorting**: stable multi-key ordering
//! - **Windows**: partitioned sliding-window aggregation
//!
//! ## Modules
//!
//! - [`record`]: Dotted paths and value helpers
//! - [`query`]: Predicates, filter, select, sort, window, executor
//! - [`index`]: Grouping, indexes, chunking
//! - [`config`]: TOML configuration with environment overrides
//! - [`output`]: JSON, CSV and table rendering
//!
//! ## Quick Start
//!
//! ```rust
//! use nestquery::query::run;
//! use serde_json::json;
//!
//! let rows = run(&json!({
//!     "from": [
//!         {"a": 1, "b": [{"c": 1}, {"c": 2}]},
//!         {"a": 2, "b": [{"c": 3}]}
//!     ],
//!     "where": {"term": {"b.c": 2}},
//!     "select": "a"
//! }))
//! .unwrap();
//!
//! assert_eq!(rows, vec![json!(1)]);
//! ```

pub mod config;
pub mod index;
pub mod output;
pub mod query;
pub mod record;

// Re-export top-level types for convenience
pub use record::{Path, Resolved};

pub use query::{
    drill_filter, run, FlatList, Predicate, Query, QueryBuilder, QueryError, QueryExecutor,
    QueryOutput, QueryResult, SortSpec, WindowSpec,
};

pub use index::{group_by, Group, Index, Multiset, UniqueIndex};

pub use config::{Config, ConfigError, EngineConfig, LoggingConfig, OutputConfig, OutputFormat};

pub use output::OutputError;
