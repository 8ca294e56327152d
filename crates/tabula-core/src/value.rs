//! Typed cell values.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use std::fmt;

/// Canonical text format for `date` cells.
pub const DATE_FORMAT: &str = "%Y-%m-%d";
/// Canonical text format for `datetime` cells.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Input format for `time` / `span` cells.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// One converted cell. The variant is fixed by the column's resolved
/// convert strategy; a record is a `Vec<Value>` with one entry per column.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Real(f64),
    Text(String),
    /// Raw digest output of the `md5`, `sha1` and `sha256` hashes.
    Bytes(Vec<u8>),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    /// Duration since midnight.
    Span(TimeDelta),
    Json(serde_json::Value),
}

impl Value {
    /// Short variant name used in mismatch diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::UInt(_) => "uint",
            Value::Real(_) => "real",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytes",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Span(_) => "span",
            Value::Json(_) => "json",
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u64> {
        match self {
            Value::UInt(v) => Some(*v),
            _ => None,
        }
    }
}

/// Render a span as `H:MM:SS` (hours unpadded). Negative spans never come
/// out of the time parser, but are rendered with a leading `-`.
fn write_span(f: &mut fmt::Formatter<'_>, span: &TimeDelta) -> fmt::Result {
    let total = span.num_seconds();
    let sign = if total < 0 { "-" } else { "" };
    let total = total.unsigned_abs();
    let (h, m, s) = (total / 3600, (total % 3600) / 60, total % 60);
    write!(f, "{sign}{h}:{m:02}:{s:02}")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::UInt(v) => write!(f, "{v}"),
            Value::Real(v) => write!(f, "{v}"),
            Value::Text(s) => f.write_str(s),
            Value::Bytes(bytes) => {
                for b in bytes {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
            Value::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            Value::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            Value::Span(span) => write_span(f, span),
            Value::Json(json) => write!(f, "{json}"),
        }
    }
}
