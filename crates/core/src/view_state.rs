use std::collections::BTreeMap;

use thiserror::Error;

use crate::fields::Field;
use crate::row::Row;

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Pattern {
    raw: String,
    folded: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterState {
    patterns: BTreeMap<Field, Pattern>,
}

impl FilterState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: Field, pattern: impl Into<String>) -> Self {
        self.set(field, pattern);
        self
    }

    /// Returns `true` when the stored pattern for `field` changed. An empty
    /// pattern removes the constraint.
    pub fn set(&mut self, field: Field, pattern: impl Into<String>) -> bool {
        let raw = pattern.into();
        if raw.is_empty() {
            return self.patterns.remove(&field).is_some();
        }
        if self.pattern(field) == raw {
            return false;
        }
        let folded = raw.to_lowercase();
        self.patterns.insert(field, Pattern { raw, folded });
        true
    }

    pub fn clear_field(&mut self, field: Field) -> bool {
        self.patterns.remove(&field).is_some()
    }

    pub fn clear(&mut self) -> bool {
        let had_patterns = !self.patterns.is_empty();
        self.patterns.clear();
        had_patterns
    }

    #[must_use]
    pub fn pattern(&self, field: Field) -> &str {
        self.patterns
            .get(&field)
            .map_or("", |pattern| pattern.raw.as_str())
    }

    pub fn active(&self) -> impl Iterator<Item = (Field, &str)> {
        self.patterns
            .iter()
            .map(|(field, pattern)| (*field, pattern.raw.as_str()))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    #[must_use]
    pub fn matches(&self, row: &Row) -> bool {
        self.patterns
            .iter()
            .all(|(field, pattern)| row.get(*field).to_lowercase().contains(&pattern.folded))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortDirection {
    Ascending,
    Descending,
}

impl SortDirection {
    #[must_use]
    pub fn reversed(self) -> Self {
        match self {
            Self::Ascending => Self::Descending,
            Self::Descending => Self::Ascending,
        }
    }

    #[must_use]
    pub fn arrow(self) -> &'static str {
        match self {
            Self::Ascending => "▲",
            Self::Descending => "▼",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub field: Field,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortState {
    active: Option<SortKey>,
}

impl SortState {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn by(field: Field, direction: SortDirection) -> Self {
        Self {
            active: Some(SortKey { field, direction }),
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<SortKey> {
        self.active
    }

    #[must_use]
    pub fn direction_for(&self, field: Field) -> Option<SortDirection> {
        self.active
            .filter(|key| key.field == field)
            .map(|key| key.direction)
    }

    /// Header-click behaviour: an ascending sort on the same field flips to
    /// descending, anything else starts ascending on `field`.
    #[must_use]
    pub fn toggled(&self, field: Field) -> Self {
        match self.direction_for(field) {
            Some(SortDirection::Ascending) => Self::by(field, SortDirection::Descending),
            _ => Self::by(field, SortDirection::Ascending),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageStateError {
    #[error("page size must be greater than 0")]
    ZeroPageSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageState {
    index: usize,
    size: usize,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            index: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageState {
    pub fn new(index: usize, size: usize) -> Result<Self, PageStateError> {
        if size == 0 {
            return Err(PageStateError::ZeroPageSize);
        }
        Ok(Self { index, size })
    }

    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn start_offset(&self) -> usize {
        self.index.saturating_mul(self.size)
    }

    #[must_use]
    pub fn with_index(self, index: usize) -> Self {
        Self { index, ..self }
    }

    #[must_use]
    pub fn first(self) -> Self {
        self.with_index(0)
    }
}

/// User intents the engine keeps between fetches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ViewState {
    pub filters: FilterState,
    pub sort: SortState,
    pub page: PageState,
}
