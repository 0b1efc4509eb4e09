use crate::fields::{Field, FIELD_COUNT};

/// One registry record. Every recognized field is always present; a value the
/// source did not provide is the empty string.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Row {
    values: [String; FIELD_COUNT],
}

impl Row {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    #[must_use]
    pub fn get(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &str)> {
        Field::ALL
            .into_iter()
            .zip(self.values.iter().map(String::as_str))
    }
}
