//! Nested Record Access
//!
//! Records are `serde_json::Value` trees: objects whose values are scalars,
//! nested objects, or arrays of nested objects.
//!
//! - **path**: Dotted field paths (`"a.b.c"`), parsed with nom
//! - **resolve**: Walk a path through a record, stopping at the first array
//! - **compare**: Equality and ordering rules shared by filters and sorts
//!
//! # Nesting Boundaries
//!
//! ```text
//! record: {"a": 1, "b": [{"c": 1}, {"c": 2}]}
//! path:   b.c
//!         ^ array with path remaining → Nested { column: "b", rest: "c" }
//! ```

mod compare;
mod path;
mod resolve;

pub use compare::{compare_scalars, values_equal, GroupKey, ValueKind};
pub use path::Path;
pub use resolve::{get_path, resolve, set_path, Resolved};
