//! Query description
//!
//! A query names a source collection and the optional stages applied to it.
//! Stages always run in the same order regardless of how they were supplied:
//!
//! ```text
//! from → window* → where → sort → select
//! ```

use serde_json::Value;

use crate::record::Path;

use super::predicate::Predicate;
use super::sort::{SortDirection, SortKey, SortSpec};
use super::window::WindowSpec;

/// A parsed query ready for execution
#[derive(Debug, Clone)]
pub struct Query {
    /// Collection the stages run over
    pub from: Source,
    /// Window columns, evaluated in order
    pub window: Vec<WindowSpec>,
    /// Drill-down filter
    pub where_: Option<Predicate>,
    pub sort: Option<SortSpec>,
    pub select: Option<Selection>,
}

impl Query {
    /// Start building a query over in-memory records
    pub fn from_records(records: Vec<Value>) -> QueryBuilder {
        QueryBuilder::new(Source::Records(records))
    }

    /// Start building a query over the output of another query
    pub fn from_query(query: Query) -> QueryBuilder {
        QueryBuilder::new(Source::Query(Box::new(query)))
    }
}

/// Where a query reads its records from
#[derive(Debug, Clone)]
pub enum Source {
    Records(Vec<Value>),
    /// Nested query, run first
    Query(Box<Query>),
}

/// Projection clause
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    /// One path; the result is a flat list of values
    Single(Path),
    /// Several paths; the result is one object per record or nested element
    Many(Vec<Path>),
}

/// Builder for constructing queries
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    from: Source,
    window: Vec<WindowSpec>,
    where_: Option<Predicate>,
    sort: Option<SortSpec>,
    select: Option<Selection>,
}

impl QueryBuilder {
    pub fn new(from: Source) -> Self {
        Self {
            from,
            window: Vec::new(),
            where_: None,
            sort: None,
            select: None,
        }
    }

    /// Add a window column
    pub fn window(mut self, spec: WindowSpec) -> Self {
        self.window.push(spec);
        self
    }

    /// Set the filter predicate
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.where_ = Some(predicate);
        self
    }

    /// Append a sort key
    pub fn sort_by(mut self, field: Path, direction: SortDirection) -> Self {
        self.sort
            .get_or_insert_with(SortSpec::default)
            .keys
            .push(SortKey { field, direction });
        self
    }

    /// Project a single path
    pub fn select(mut self, path: Path) -> Self {
        self.select = Some(Selection::Single(path));
        self
    }

    /// Project several paths
    pub fn select_many(mut self, paths: Vec<Path>) -> Self {
        self.select = Some(Selection::Many(paths));
        self
    }

    /// Build the query
    pub fn build(self) -> Query {
        Query {
            from: self.from,
            window: self.window,
            where_: self.where_,
            sort: self.sort,
            select: self.select,
        }
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
    fn test_query_builder() {
        let query = Query::from_records(vec![json!({"a": 1})])
            .filter(Predicate::term(path("a"), json!(1)))
            .sort_by(path("a"), SortDirection::Descending)
            .sort_by(path("b"), SortDirection::Ascending)
            .select(path("a"))
            .build();

        assert!(matches!(query.from, Source::Records(ref r) if r.len() == 1));
        assert!(query.where_.is_some());
        assert_eq!(
            query.sort,
            Some(SortSpec::new(vec![SortKey::desc(path("a")), SortKey::asc(path("b"))]))
        );
        assert_eq!(query.select, Some(Selection::Single(path("a"))));
        assert!(query.window.is_empty());
    }

    #[test]
    fn test_nested_source() {
        let inner = Query::from_records(Vec::new()).build();
        let outer = Query::from_query(inner).select_many(vec![path("x")]).build();

        assert!(matches!(outer.from, Source::Query(_)));
        assert_eq!(outer.select, Some(Selection::Many(vec![path("x")])));
    }
}
