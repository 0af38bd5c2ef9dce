//! Query Executor
//!
//! Runs a [`Query`] over its source collection. The stages always run in
//! this order:
//!
//! # Execution Pipeline
//!
//! ```text
//! from (nested queries first) → window* → where → sort → select → result
//! ```
//!
//! The `where` stage drills into nested arrays and hands merged records on,
//! so each matching nested element becomes its own record downstream.

use serde_json::Value;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::index::columns;
use crate::query::ast::{Query, Selection, Source};
use crate::query::error::QueryResult;
use crate::query::filter::drill_filter_with_limit;
use crate::query::parser::parse_query_with;
use crate::query::select::{select_fields, select_values};
use crate::query::sort::sort;
use crate::query::window::window;

/// Result of a query execution
#[derive(Debug, Clone)]
pub struct QueryOutput {
    /// Column names in first-seen order (the path itself for a single-path select)
    pub columns: Vec<String>,
    /// Result rows
    pub rows: Vec<Value>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Number of source records read, nested sources included
    pub records_scanned: usize,
}

impl QueryOutput {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Query executor
#[derive(Debug, Clone, Default)]
pub struct QueryExecutor {
    config: EngineConfig,
}

impl QueryExecutor {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Parse a JSON query description and execute it
    pub fn run(&self, input: &Value) -> QueryResult<QueryOutput> {
        let query = parse_query_with(input, self.config.strict)?;
        self.execute(query)
    }

    /// Execute a parsed query
    pub fn execute(&self, query: Query) -> QueryResult<QueryOutput> {
        let start = Instant::now();
        let mut scanned = 0;

        let selection = query.select.clone();
        let rows = self.execute_stages(query, &mut scanned)?;

        let columns = match &selection {
            Some(Selection::Single(path)) => vec![path.to_string()],
            _ => columns(&rows),
        };

        Ok(QueryOutput {
            columns,
            rows,
            execution_time_ms: start.elapsed().as_millis() as u64,
            records_scanned: scanned,
        })
    }

    fn execute_stages(&self, query: Query, scanned: &mut usize) -> QueryResult<Vec<Value>> {
        // 1. Materialize the source
        let mut records = match query.from {
            Source::Records(records) => records,
            Source::Query(inner) => {
                tracing::debug!("running nested source query");
                self.execute_stages(*inner, scanned)?
            }
        };
        *scanned += records.len();
        tracing::debug!(records = records.len(), "query source loaded");

        // 2. Window columns
        for spec in &query.window {
            records = window(records, spec)?;
            tracing::debug!(window = %spec.name, records = records.len(), "window applied");
        }

        // 3. Drill-down filter
        if let Some(predicate) = &query.where_ {
            records = {
                let filtered = drill_filter_with_limit(predicate, &records, self.config.max_depth)?;
                tracing::debug!(
                    rows = filtered.len(),
                    depth = filtered.depth(),
                    "where applied"
                );
                filtered.to_records()
            };
        }

        // 4. Sort
        if let Some(spec) = &query.sort {
            records = sort(records, spec)?;
            tracing::debug!(keys = spec.keys.len(), "sort applied");
        }

        // 5. Projection
        let rows = match &query.select {
            None => records,
            Some(Selection::Single(path)) => select_values(&records, path),
            Some(Selection::Many(paths)) => select_fields(&records, paths)?,
        };
        tracing::debug!(rows = rows.len(), "query complete");

        Ok(rows)
    }
}

/// Run a JSON query description with the default engine settings
pub fn run(input: &Value) -> QueryResult<Vec<Value>> {
    QueryExecutor::default().run(input).map(|output| output.rows)
}
