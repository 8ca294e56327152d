//! Binary encoding stage: typed values to byte cells.

use serde::{Deserialize, Serialize};

use crate::table::{TableError, TypedTable};

/// A table whose every cell is a byte string.
///
/// Header and type rows hold the UTF-8 bytes of the field names and type
/// expressions. Cells hold each column's `dump` output: fixed-width
/// little-endian for numbers, raw bytes for digests, encoded text for
/// strings. How the cells are framed on disk is up to the caller; see
/// [`crate::artifact`] for the bundled container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryTable {
    pub field_names: Vec<Vec<u8>>,
    pub field_types: Vec<Vec<u8>>,
    pub records: Vec<Vec<Vec<u8>>>,
}

impl BinaryTable {
    /// Dump every cell of `typed`, row-major. The first failing cell aborts
    /// with its row and column.
    pub fn encode(typed: &TypedTable) -> Result<Self, TableError> {
        let field_names = typed
            .field_names()
            .iter()
            .map(|name| name.as_bytes().to_vec())
            .collect();
        let field_types = typed
            .field_types()
            .iter()
            .map(|t| t.expr().as_bytes().to_vec())
            .collect();

        let records = typed
            .records()
            .iter()
            .enumerate()
            .map(|(row, record)| {
                typed
                    .field_types()
                    .iter()
                    .zip(record)
                    .enumerate()
                    .map(|(col, (field_type, value))| {
                        field_type
                            .dump(value)
                            .map_err(|source| TableError::Dump { row, col, source })
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        let table = Self {
            field_names,
            field_types,
            records,
        };
        tracing::debug!(
            rows = table.row_count(),
            bytes = table.payload_len(),
            "encoded binary table"
        );
        Ok(table)
    }

    pub fn column_count(&self) -> usize {
        self.field_names.len()
    }

    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Total bytes across all data cells.
    pub fn payload_len(&self) -> usize {
        self.records.iter().flatten().map(Vec::len).sum()
    }
}
