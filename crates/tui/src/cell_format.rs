use std::borrow::Cow;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use fmv_core::fields::{Field, FieldKind};
use thiserror::Error;

const DISPLAY_DATE_FORMAT: &str = "%m/%d/%Y";
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];
const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%m/%d/%Y"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("`{0}` is not a recognizable date")]
    UnparseableDate(String),
}

/// Text shown for one cell. Date fields are reformatted; anything that does
/// not parse falls back to the raw value.
#[must_use]
pub fn display_value(field: Field, raw: &str) -> Cow<'_, str> {
    if field.kind() != FieldKind::Date || raw.trim().is_empty() {
        return Cow::Borrowed(raw);
    }
    match format_date(raw) {
        Ok(formatted) => Cow::Owned(formatted),
        Err(_) => Cow::Borrowed(raw),
    }
}

pub fn format_date(raw: &str) -> Result<String, FormatError> {
    parse_date(raw.trim())
        .map(|date| date.format(DISPLAY_DATE_FORMAT).to_string())
        .ok_or_else(|| FormatError::UnparseableDate(raw.to_string()))
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    if let Some(date) = parse_sheet_date_literal(raw) {
        return Some(date);
    }
    if let Ok(date_time) = DateTime::parse_from_rfc3339(raw) {
        return Some(date_time.date_naive());
    }
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|date_time| date_time.date())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        })
}

// The query endpoint encodes dates as `Date(year,month,day[,h,m,s])` with a
// zero-based month.
fn parse_sheet_date_literal(raw: &str) -> Option<NaiveDate> {
    let inner = raw.strip_prefix("Date(")?.strip_suffix(')')?;
    let mut parts = inner.split(',').map(str::trim);
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    let day = parts.next()?.parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month.checked_add(1)?, day)
}
