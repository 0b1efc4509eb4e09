use std::ops::Range;

use crate::row::Row;

/// The most recently applied page of rows. Replaced wholesale, never merged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LoadedWindow {
    rows: Vec<Row>,
    offset: usize,
    sequence: Option<u64>,
}

impl LoadedWindow {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new(rows: Vec<Row>, offset: usize, sequence: u64) -> Self {
        Self {
            rows,
            offset,
            sequence: Some(sequence),
        }
    }

    #[must_use]
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Sequence number of the request that produced this window, `None`
    /// before the first successful fetch.
    #[must_use]
    pub fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    #[must_use]
    pub fn source_range(&self) -> Range<usize> {
        self.offset..self.offset.saturating_add(self.rows.len())
    }
}
