//! Tables flowing through the compilation pipeline.
//!
//! Every stage produces a new immutable [`Table`]; only the header/type/cell
//! types change:
//!
//! | stage | alias | type row | cells |
//! |---|---|---|---|
//! | source grid | [`RawTable`] | type expressions | text |
//! | after conversion | [`TypedTable`] | [`FieldType`] | [`Value`] |
//! | after encoding | [`BinaryTable`](crate::binary::BinaryTable) | bytes | bytes |

use std::fmt;

use crate::field_type::{DumpError, FailureKind, FieldType, TypeError};
use crate::value::Value;

/// Errors raised while building or transforming a table.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("table needs a header row and a type row")]
    MissingHeader,

    #[error("{names} field names but {types} field types")]
    ColumnCountMismatch { names: usize, types: usize },

    #[error("row {row}: expected {expected} cells, found {found}")]
    RaggedRecord {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Type(#[from] TypeError),

    #[error("row {row}, column {col}: {kind} '{value}' ({memo})")]
    FieldConversion {
        kind: FailureKind,
        row: usize,
        col: usize,
        value: String,
        memo: String,
    },

    #[error("row {row}, column {col}: {source}")]
    Dump {
        row: usize,
        col: usize,
        #[source]
        source: DumpError,
    },
}

/// A named grid: `N` field names, `N` field types, and records of `N` cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Table<T, C> {
    field_names: Vec<String>,
    field_types: Vec<T>,
    records: Vec<Vec<C>>,
}

/// Source grid: type expressions and text cells.
pub type RawTable = Table<String, String>;

/// Converted table: resolved field types and typed cells.
pub type TypedTable = Table<FieldType, Value>;

impl<T, C> Table<T, C> {
    /// Build a table, checking that names, types and every record agree on
    /// the column count.
    pub fn new(
        field_names: Vec<String>,
        field_types: Vec<T>,
        records: Vec<Vec<C>>,
    ) -> Result<Self, TableError> {
        if field_names.len() != field_types.len() {
            return Err(TableError::ColumnCountMismatch {
                names: field_names.len(),
                types: field_types.len(),
            });
        }
        let expected = field_names.len();
        if let Some((row, record)) = records
            .iter()
            .enumerate()
            .find(|(_, record)| record.len() != expected)
        {
            return Err(TableError::RaggedRecord {
                row,
                expected,
                found: record.len(),
            });
        }
        Ok(Self {
            field_names,
            field_types,
            records,
        })
    }

    /// Assemble a table whose shape the caller already guarantees.
    pub(crate) fn from_parts(
        field_names: Vec<String>,
        field_types: Vec<T>,
        records: Vec<Vec<C>>,
    ) -> Self {
        debug_assert_eq!(field_names.len(), field_types.len());
        debug_assert!(records.iter().all(|r| r.len() == field_names.len()));
        Self {
            field_names,
            field_types,
            records,
        }
    }

    pub fn field_names(&self) -> &[String] {
        &self.field_names
    }

    pub fn field_types(&self) -> &[T] {
        &self.field_types
    }

    pub fn records(&self) -> &[Vec<C>] {
        &self.records
    }

    pub fn column_count(&self) -> usize {
        self.field_names.len()
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Index of the column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.field_names.iter().position(|n| n == name)
    }

    /// Decompose into `(field_names, field_types, records)`.
    pub fn into_parts(self) -> (Vec<String>, Vec<T>, Vec<Vec<C>>) {
        (self.field_names, self.field_types, self.records)
    }
}

impl RawTable {
    /// Build from a text grid: row 0 holds field names, row 1 type
    /// expressions, the rest data.
    ///
    /// Spreadsheet exports drop trailing empty cells, so short rows are
    /// padded with empty strings; rows longer than the header are rejected.
    pub fn from_rows<R, S>(rows: impl IntoIterator<Item = R>) -> Result<Self, TableError>
    where
        R: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut rows = rows
            .into_iter()
            .map(|row| row.into_iter().map(Into::into).collect::<Vec<String>>());
        let field_names = rows.next().ok_or(TableError::MissingHeader)?;
        let mut field_types = rows.next().ok_or(TableError::MissingHeader)?;
        let width = field_names.len();

        if field_types.len() > width {
            return Err(TableError::ColumnCountMismatch {
                names: width,
                types: field_types.len(),
            });
        }
        field_types.resize(width, String::new());

        let records = rows
            .enumerate()
            .map(|(row, mut record)| {
                if record.len() > width {
                    return Err(TableError::RaggedRecord {
                        row,
                        expected: width,
                        found: record.len(),
                    });
                }
                record.resize(width, String::new());
                Ok(record)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(field_names, field_types, records)
    }
}

impl<T: fmt::Display, C: fmt::Display> fmt::Display for Table<T, C> {
    /// Head line, type line, then one line per record, comma-separated.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.field_names.join(", "))?;
        write_line(f, &self.field_types)?;
        for record in &self.records {
            writeln!(f)?;
            write_line(f, record)?;
        }
        Ok(())
    }
}

fn write_line<D: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[D]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}
