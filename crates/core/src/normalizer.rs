use tracing::debug;

use crate::decoder::{DecodedRow, DecodedTable};
use crate::fields::Field;
use crate::row::Row;

#[must_use]
pub fn normalize_row(decoded: &DecodedRow) -> Row {
    let mut row = Row::new();
    for (label, value) in &decoded.cells {
        if let Some(field) = Field::from_source_label(label) {
            row.set(field, value.as_str());
        }
    }
    row
}

#[must_use]
pub fn normalize_table(table: &DecodedTable) -> Vec<Row> {
    let ignored = table
        .columns
        .iter()
        .filter(|label| Field::from_source_label(label).is_none())
        .map(String::as_str)
        .collect::<Vec<_>>();
    if !ignored.is_empty() {
        debug!(columns = ?ignored, "ignoring unrecognized source columns");
    }

    table.rows.iter().map(normalize_row).collect()
}
