//! Compaction: drop decorated/metadata columns and comment/blank rows.
//!
//! Only columns whose name is a plain identifier (`^\w+$`) survive, so
//! localization columns such as `$name[en]` and marker columns such as
//! `#note` never reach conversion. The localization stage reads the raw
//! table directly and still sees them.

use std::sync::LazyLock;

use regex::Regex;

use crate::field_type::TypeError;
use crate::table::{RawTable, TableError};

static PLAIN_FIELD_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("field name pattern is valid"));

/// True if `name` is a plain identifier column.
pub fn is_plain_field(name: &str) -> bool {
    PLAIN_FIELD_NAME.is_match(name)
}

/// True if a data record should be skipped: empty, blank first cell, or a
/// first cell starting with `#`.
pub fn is_comment_or_blank<S: AsRef<str>>(record: &[S]) -> bool {
    match record.first() {
        None => true,
        Some(first) => {
            let first = first.as_ref();
            first.trim().is_empty() || first.starts_with('#')
        }
    }
}

/// Records compaction keeps, in source order and with every column still
/// present. The row rule looks at the first plain column; a table without
/// plain columns keeps nothing.
pub fn retained_records(raw: &RawTable) -> impl Iterator<Item = &[String]> {
    retained_rows(raw).map(|(_, record)| record)
}

/// [`retained_records`] paired with each record's data-row index in `raw`.
pub fn retained_rows(raw: &RawTable) -> impl Iterator<Item = (usize, &[String])> {
    let first_plain = raw.field_names().iter().position(|n| is_plain_field(n));
    raw.records()
        .iter()
        .map(Vec::as_slice)
        .enumerate()
        .filter(move |(_, record)| match first_plain {
            Some(i) => !is_comment_or_blank(&record[i..]),
            None => false,
        })
}

/// Raw-table position of every row and column kept by compaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceMap {
    /// `rows[i]` is the raw data-row index of compacted row `i`.
    pub rows: Vec<usize>,
    /// `cols[j]` is the raw column index of compacted column `j`.
    pub cols: Vec<usize>,
}

impl SourceMap {
    /// Rewrite the cell location of a conversion or dump error from
    /// compacted to raw coordinates. Other errors pass through.
    pub fn locate(&self, err: TableError) -> TableError {
        let row_of = |row: usize| self.rows.get(row).copied().unwrap_or(row);
        let col_of = |col: usize| self.cols.get(col).copied().unwrap_or(col);
        match err {
            TableError::FieldConversion {
                kind,
                row,
                col,
                value,
                memo,
            } => TableError::FieldConversion {
                kind,
                row: row_of(row),
                col: col_of(col),
                value,
                memo,
            },
            TableError::Dump { row, col, source } => TableError::Dump {
                row: row_of(row),
                col: col_of(col),
                source,
            },
            TableError::Type(TypeError::Column { col, source }) => {
                TableError::Type(TypeError::Column {
                    col: col_of(col),
                    source,
                })
            }
            other => other,
        }
    }
}

/// Compact a raw table. Column filtering is applied to names, type
/// expressions and cells alike, then rows are filtered; relative order is
/// preserved. Idempotent.
pub fn compact(raw: &RawTable) -> RawTable {
    compact_with_source(raw).0
}

/// [`compact`], also returning where each kept row and column sits in `raw`.
pub fn compact_with_source(raw: &RawTable) -> (RawTable, SourceMap) {
    let keep: Vec<usize> = raw
        .field_names()
        .iter()
        .enumerate()
        .filter(|(_, name)| is_plain_field(name))
        .map(|(i, _)| i)
        .collect();

    let pick = |cells: &[String]| -> Vec<String> {
        keep.iter().map(|&i| cells[i].clone()).collect()
    };

    let field_names = pick(raw.field_names());
    let field_types = pick(raw.field_types());
    let (rows, records): (Vec<usize>, Vec<Vec<String>>) = retained_rows(raw)
        .map(|(row, record)| (row, pick(record)))
        .unzip();

    let dropped_rows = raw.row_count() - records.len();
    let dropped_columns = raw.column_count() - keep.len();
    if dropped_rows > 0 || dropped_columns > 0 {
        tracing::debug!(dropped_rows, dropped_columns, "compacted table");
    }

    // Same column subset everywhere, so the shape invariant still holds.
    let table = RawTable::from_parts(field_names, field_types, records);
    (table, SourceMap { rows, cols: keep })
}
