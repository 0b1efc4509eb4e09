use serde::Deserialize;
use serde_json::{Number, Value};
use thiserror::Error;

pub const ENVELOPE_PREFIX: &str = "/*O_o*/\ngoogle.visualization.Query.setResponse(";
pub const ENVELOPE_SUFFIX: &str = ");";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("envelope-mismatch: {detail}")]
    EnvelopeMismatch { detail: String },
    #[error("query rejected by endpoint ({reason}): {message}")]
    QueryRejected { reason: String, message: String },
    #[error("response payload has no table")]
    MissingTable,
}

impl DecodeError {
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::EnvelopeMismatch { .. } => "envelope-mismatch",
            Self::QueryRejected { .. } => "query-rejected",
            Self::MissingTable => "missing-table",
        }
    }

    fn envelope(detail: impl Into<String>) -> Self {
        Self::EnvelopeMismatch {
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRow {
    pub cells: Vec<(String, String)>,
}

impl DecodedRow {
    #[must_use]
    pub fn value(&self, label: &str) -> Option<&str> {
        self.cells
            .iter()
            .find(|(cell_label, _)| cell_label == label)
            .map(|(_, value)| value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecodedTable {
    pub columns: Vec<String>,
    pub rows: Vec<DecodedRow>,
}

#[derive(Debug, Deserialize)]
struct ResponsePayload {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    errors: Vec<PayloadError>,
    #[serde(default)]
    table: Option<PayloadTable>,
}

#[derive(Debug, Deserialize)]
struct PayloadError {
    #[serde(default)]
    reason: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    detailed_message: String,
}

#[derive(Debug, Deserialize)]
struct PayloadTable {
    #[serde(default)]
    cols: Option<Vec<PayloadColumn>>,
    #[serde(default)]
    rows: Option<Vec<PayloadRow>>,
}

#[derive(Debug, Deserialize)]
struct PayloadColumn {
    #[serde(default)]
    label: String,
}

#[derive(Debug, Deserialize)]
struct PayloadRow {
    #[serde(default)]
    c: Vec<Option<PayloadCell>>,
}

#[derive(Debug, Deserialize)]
struct PayloadCell {
    #[serde(default)]
    v: Value,
}

pub fn decode_response(body: &str) -> Result<DecodedTable, DecodeError> {
    let inner = strip_envelope(body)?;
    let payload: ResponsePayload = serde_json::from_str(inner)
        .map_err(|error| DecodeError::envelope(format!("payload is not valid JSON: {error}")))?;

    if payload.status.as_deref() == Some("error") {
        let first = payload.errors.into_iter().next();
        return Err(match first {
            Some(error) => DecodeError::QueryRejected {
                reason: error.reason,
                message: if error.detailed_message.is_empty() {
                    error.message
                } else {
                    error.detailed_message
                },
            },
            None => DecodeError::QueryRejected {
                reason: "unknown".to_string(),
                message: "endpoint reported an error without details".to_string(),
            },
        });
    }

    let table = payload.table.ok_or(DecodeError::MissingTable)?;
    let (Some(cols), Some(rows)) = (table.cols, table.rows) else {
        return Err(DecodeError::MissingTable);
    };

    let columns = cols.into_iter().map(|col| col.label).collect::<Vec<_>>();
    let rows = rows
        .into_iter()
        .map(|row| DecodedRow {
            cells: columns
                .iter()
                .enumerate()
                .map(|(index, label)| {
                    let value = row
                        .c
                        .get(index)
                        .and_then(Option::as_ref)
                        .map(|cell| cell_text(&cell.v))
                        .unwrap_or_default();
                    (label.clone(), value)
                })
                .collect(),
        })
        .collect();

    Ok(DecodedTable { columns, rows })
}

fn strip_envelope(body: &str) -> Result<&str, DecodeError> {
    let without_prefix = body
        .strip_prefix(ENVELOPE_PREFIX)
        .ok_or_else(|| DecodeError::envelope("response does not start with the expected prefix"))?;
    without_prefix
        .trim_end()
        .strip_suffix(ENVELOPE_SUFFIX)
        .ok_or_else(|| DecodeError::envelope("response does not end with the expected suffix"))
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number_text(number),
        other => other.to_string(),
    }
}

// Sheet numbers arrive as doubles; whole values render without a fraction.
#[allow(clippy::cast_possible_truncation)]
fn number_text(number: &Number) -> String {
    if let Some(integer) = number.as_i64() {
        return integer.to_string();
    }
    if let Some(integer) = number.as_u64() {
        return integer.to_string();
    }
    match number.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < 1e15 => (float as i64).to_string(),
        _ => number.to_string(),
    }
}
