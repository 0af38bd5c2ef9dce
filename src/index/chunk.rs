//! Size-bounded chunking
//!
//! Sequences are cut lazily into fixed-size chunks. Weighted multisets are
//! packed greedily: a chunk closes once it reaches `min_size`, or before a key
//! would push it past `max_size`.

use std::collections::HashMap;

use crate::query::{QueryError, QueryResult};

/// Lazy fixed-size chunking over any iterator. Yields `(index, chunk)`.
#[derive(Debug)]
pub struct Chunks<I: Iterator> {
    inner: I,
    size: usize,
    index: usize,
}

impl<I: Iterator> Iterator for Chunks<I> {
    type Item = (usize, Vec<I::Item>);

    fn next(&mut self) -> Option<Self::Item> {
        let chunk: Vec<I::Item> = self.inner.by_ref().take(self.size).collect();
        if chunk.is_empty() {
            return None;
        }
        let index = self.index;
        self.index += 1;
        Some((index, chunk))
    }
}

/// Cut `items` into consecutive chunks of `size` (the last may be shorter)
pub fn chunks<T: IntoIterator>(items: T, size: usize) -> QueryResult<Chunks<T::IntoIter>> {
    if size == 0 {
        return Err(QueryError::InvalidQuery("chunk size must be positive".to_string()));
    }
    Ok(Chunks {
        inner: items.into_iter(),
        size,
        index: 0,
    })
}

/// Key to count mapping that remembers insertion order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Multiset {
    entries: Vec<(String, usize)>,
    position: HashMap<String, usize>,
}

impl Multiset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` occurrences of `key`
    pub fn add(&mut self, key: impl Into<String>, count: usize) {
        let key = key.into();
        match self.position.get(&key) {
            Some(&i) => self.entries[i].1 += count,
            None => {
                self.position.insert(key.clone(), self.entries.len());
                self.entries.push((key, count));
            }
        }
    }

    pub fn count(&self, key: &str) -> usize {
        self.position
            .get(key)
            .map(|&i| self.entries[i].1)
            .unwrap_or(0)
    }

    /// Sum of all counts
    pub fn total(&self) -> usize {
        self.entries.iter().map(|(_, c)| c).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(k, c)| (k.as_str(), *c))
    }
}

impl<K: Into<String>> FromIterator<K> for Multiset {
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut set = Self::new();
        for key in iter {
            set.add(key, 1);
        }
        set
    }
}

/// Pack the keys of `multiset` into chunks whose total weight is at most
/// `max_size`.
///
/// A chunk closes as soon as its weight reaches `min_size`, even when further
/// keys would still fit under `max_size`, so chunks stay close to `min_size`
/// rather than filling up to `max_size`.
pub fn chunk_multiset(
    multiset: &Multiset,
    min_size: usize,
    max_size: usize,
) -> QueryResult<Vec<(usize, Vec<String>)>> {
    if min_size > max_size {
        return Err(QueryError::InvalidQuery(format!(
            "min_size {} exceeds max_size {}",
            min_size, max_size
        )));
    }

    let mut output = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut weight = 0;

    for (key, count) in multiset.iter() {
        if count > max_size {
            return Err(QueryError::ChunkTooLarge {
                key: key.to_string(),
                weight: count,
                min_size,
                max_size,
            });
        }

        if !current.is_empty() && weight + count > max_size {
            close(&mut output, &mut current, weight, min_size);
            weight = 0;
        }

        current.push(key.to_string());
        weight += count;

        if weight >= min_size {
            close(&mut output, &mut current, weight, min_size);
            weight = 0;
        }
    }

    if !current.is_empty() {
        close(&mut output, &mut current, weight, min_size);
    }

    Ok(output)
}

fn close(output: &mut Vec<(usize, Vec<String>)>, current: &mut Vec<String>, weight: usize, min_size: usize) {
    if weight < min_size {
        tracing::debug!(chunk = output.len(), weight, min_size, "chunk closed below minimum size");
    }
    output.push((output.len(), std::mem::take(current)));
}

/// `(start, end)` pairs of width `size` covering `[min, max)`; the last pair
/// may be narrower.
pub fn intervals(min: i64, max: i64, size: i64) -> QueryResult<Vec<(i64, i64)>> {
    if size <= 0 {
        return Err(QueryError::InvalidQuery("interval size must be positive".to_string()));
    }

    let mut output = Vec::new();
    let mut start = min;
    while start < max {
        let end = start.saturating_add(size).min(max);
        output.push((start, end));
        start = end;
    }
    Ok(output)
}
