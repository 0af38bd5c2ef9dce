//! Grouping and Indexing
//!
//! Collection-level helpers that sit beside the query pipeline:
//!
//! - **group_by / partition**: exact-key grouping, first-seen group order
//! - **Index / UniqueIndex**: key tuple → records lookups, and relations
//!   (`map`, `map_to_set`) over lists of key values
//! - **chunks / chunk_multiset**: size- and weight-bounded chunking
//! - **columns / unstack / intervals**: column discovery, pivoting, ranges
//!
//! # Grouping
//!
//! ```text
//! [{k:b}, {k:a}, {k:b}]
//!        ↓ key tuple per record (kind-tagged: "b", "a", "b")
//! [Group{k:b, [0, 2]}, Group{k:a, [1]}]
//! ```

mod chunk;
mod group;
mod lookup;

pub use chunk::{chunk_multiset, chunks, intervals, Chunks, Multiset};
pub use group::{columns, group_by, partition, unstack, Group};
pub use lookup::{Index, UniqueIndex};
