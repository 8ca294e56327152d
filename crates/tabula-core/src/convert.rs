//! Conversion stage: raw text cells to typed values.

use crate::field_type::FieldType;
use crate::registry::TypeRegistry;
use crate::table::{RawTable, TableError, TypedTable};
use crate::value::Value;

impl TypedTable {
    /// Resolve every column's type expression and convert each cell,
    /// row-major. The first failing cell aborts the whole table; the error
    /// carries its data-row offset and column index.
    ///
    /// Expects a compacted table (see [`crate::compact::compact`]); metadata
    /// columns would otherwise fail type resolution.
    pub fn convert(raw: &RawTable, registry: &TypeRegistry) -> Result<Self, TableError> {
        let field_types = registry.resolve_all(raw.field_types())?;
        Self::convert_with(raw, field_types)
    }

    /// Convert with already-resolved field types (one per column).
    pub fn convert_with(raw: &RawTable, field_types: Vec<FieldType>) -> Result<Self, TableError> {
        if field_types.len() != raw.column_count() {
            return Err(TableError::ColumnCountMismatch {
                names: raw.column_count(),
                types: field_types.len(),
            });
        }

        let records = raw
            .records()
            .iter()
            .enumerate()
            .map(|(row, record)| convert_record(row, record, &field_types))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            rows = records.len(),
            columns = field_types.len(),
            "converted table"
        );
        Ok(Self::from_parts(
            raw.field_names().to_vec(),
            field_types,
            records,
        ))
    }
}

fn convert_record(
    row: usize,
    record: &[String],
    field_types: &[FieldType],
) -> Result<Vec<Value>, TableError> {
    field_types
        .iter()
        .zip(record)
        .enumerate()
        .map(|(col, (field_type, text))| {
            field_type
                .convert(text)
                .map_err(|failure| TableError::FieldConversion {
                    kind: failure.kind,
                    row,
                    col,
                    value: failure.value,
                    memo: failure.memo,
                })
        })
        .collect()
}
