//! Dotted field paths
//!
//! A path is an ordered list of object keys. In text form the keys are joined
//! with `.`; a literal dot or backslash inside a key is escaped with `\`.

use nom::{
    branch::alt,
    bytes::complete::{escaped_transform, is_not, tag},
    character::complete::char,
    combinator::{all_consuming, value},
    multi::separated_list1,
    IResult,
};
use std::fmt;
use std::str::FromStr;

use crate::query::{QueryError, QueryResult};

/// A parsed field path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parse a dotted path such as `"a.b.c"`
    pub fn parse(input: &str) -> QueryResult<Self> {
        if input.is_empty() {
            return Err(QueryError::InvalidPath {
                path: input.to_string(),
                reason: "empty path".to_string(),
            });
        }

        let segments = match all_consuming(parse_segments)(input) {
            Ok((_, segments)) => segments,
            Err(e) => {
                return Err(QueryError::InvalidPath {
                    path: input.to_string(),
                    reason: format!("{:?}", e),
                })
            }
        };

        if segments.iter().any(|s| s.is_empty()) {
            return Err(QueryError::InvalidPath {
                path: input.to_string(),
                reason: "empty segment".to_string(),
            });
        }

        Ok(Self { segments })
    }

    /// The empty path, which resolves to the record itself
    pub fn root() -> Self {
        Self::default()
    }

    /// Build a path from already-split segments
    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            segments: segments.into_iter().map(Into::into).collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// The first `n` segments
    pub fn prefix(&self, n: usize) -> Path {
        Self::from_segments(self.segments.iter().take(n).cloned())
    }

    /// Everything after the first `n` segments
    pub fn suffix(&self, n: usize) -> Path {
        Self::from_segments(self.segments.iter().skip(n).cloned())
    }

    /// Concatenate two paths
    pub fn join(&self, other: &Path) -> Path {
        Self::from_segments(self.segments.iter().chain(other.segments.iter()).cloned())
    }

    pub fn starts_with(&self, prefix: &Path) -> bool {
        self.segments.starts_with(&prefix.segments)
    }

    /// Remove `prefix` from the front of this path, if present
    pub fn strip_prefix(&self, prefix: &Path) -> Option<Path> {
        if self.starts_with(prefix) {
            Some(self.suffix(prefix.len()))
        } else {
            None
        }
    }
}

fn parse_segment(input: &str) -> IResult<&str, String> {
    escaped_transform(
        is_not("\\."),
        '\\',
        alt((value(".", tag(".")), value("\\", tag("\\")))),
    )(input)
}

fn parse_segments(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(char('.'), parse_segment)(input)
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", segment.replace('\\', "\\\\").replace('.', "\\."))?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
