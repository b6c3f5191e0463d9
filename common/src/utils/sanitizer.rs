//! Row sanitizer.
//!
//! Turns values read from the driver into JSON-safe cells. String data is
//! forced to valid UTF-8 and stripped of control characters; everything
//! else passes through unchanged. Sanitizing never fails.

use serde_json::Value;

use crate::models::query::Row;

/// A cell as read from the driver, before sanitizing.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// SQL NULL.
    Null,
    /// String-typed data as raw bytes, in whatever encoding the server sent.
    Text(Vec<u8>),
    /// Already typed, non-string value (number, bool, ...).
    Scalar(Value),
    /// The driver could not decode this cell.
    Unreadable,
}

/// A row as read from the driver: column name and raw value, in order.
pub type RawRow = Vec<(String, RawValue)>;

/// Cleans driver rows for transport.
pub struct ResultSanitizer;

impl ResultSanitizer {
    /// Sanitizes every row.
    pub fn sanitize_rows(rows: Vec<RawRow>) -> Vec<Row> {
        rows.into_iter().map(Self::sanitize_row).collect()
    }

    /// Sanitizes one row, keeping column order.
    pub fn sanitize_row(row: RawRow) -> Row {
        row.into_iter()
            .map(|(column, value)| (Self::clean_text(&column), Self::sanitize_value(value)))
            .collect()
    }

    /// Sanitizes one cell.
    ///
    /// An unreadable cell becomes an empty string rather than failing the row.
    pub fn sanitize_value(value: RawValue) -> Value {
        match value {
            RawValue::Null => Value::Null,
            RawValue::Text(bytes) => Value::String(Self::clean_text(&Self::coerce_utf8(bytes))),
            RawValue::Scalar(Value::String(s)) => Value::String(Self::clean_text(&s)),
            RawValue::Scalar(other) => other,
            RawValue::Unreadable => Value::String(String::new()),
        }
    }

    /// Decodes bytes as UTF-8, reinterpreting them as Latin-1 when they are
    /// not valid UTF-8.
    pub fn coerce_utf8(bytes: Vec<u8>) -> String {
        match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(err) => err.into_bytes().iter().map(|&b| char::from(b)).collect(),
        }
    }

    /// Removes control characters other than tab, line feed and carriage return.
    pub fn clean_text(text: &str) -> String {
        text.chars()
            .filter(|c| !c.is_control() || matches!(c, '\t' | '\n' | '\r'))
            .collect()
    }
}
