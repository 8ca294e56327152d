//! End-to-end compilation of one source table.

use crate::binary::BinaryTable;
use crate::compact::compact_with_source;
use crate::localization::{LocalizationError, LocalizationHashTable, LocalizationTextTable};
use crate::registry::TypeRegistry;
use crate::table::{RawTable, TableError, TypedTable};

/// Errors from any pipeline stage. Cell locations in a wrapped
/// [`TableError`] are data-row and column indices of the source table, as
/// it was before compaction.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    #[error("table '{name}': {source}")]
    Table {
        name: String,
        #[source]
        source: TableError,
    },
    #[error("table '{name}': {source}")]
    Localization {
        name: String,
        #[source]
        source: LocalizationError,
    },
}

impl CompileError {
    fn table(name: &str, source: TableError) -> Self {
        CompileError::Table {
            name: name.to_string(),
            source,
        }
    }

    fn localization(name: &str, source: LocalizationError) -> Self {
        CompileError::Localization {
            name: name.to_string(),
            source,
        }
    }
}

/// Localization output of a table with `$field[locale]` columns.
#[derive(Debug, Clone)]
pub struct CompiledLocalization {
    /// `(head, hash, text)` rows, typed.
    pub hash_table: TypedTable,
    /// Encoded hash table.
    pub binary: BinaryTable,
    /// One column per locale, for review.
    pub text_table: LocalizationTextTable,
}

/// Every product of compiling one raw table.
#[derive(Debug, Clone)]
pub struct CompiledTable {
    pub name: String,
    pub typed: TypedTable,
    pub binary: BinaryTable,
    pub localization: Option<CompiledLocalization>,
}

/// Compile `raw`: compact, convert and encode it, and extract localization
/// tables when decorated columns are present.
pub fn compile(
    name: &str,
    raw: &RawTable,
    registry: &TypeRegistry,
) -> Result<CompiledTable, CompileError> {
    let (compacted, source) = compact_with_source(raw);
    tracing::debug!(
        table = name,
        columns = compacted.column_count(),
        rows = compacted.row_count(),
        "compacted"
    );

    let located = |e: TableError| CompileError::table(name, source.locate(e));
    let typed = TypedTable::convert(&compacted, registry).map_err(located)?;
    let binary = BinaryTable::encode(&typed).map_err(located)?;
    let localization = localize(name, raw, registry)?;

    tracing::info!(
        table = name,
        rows = binary.row_count(),
        columns = binary.column_count(),
        localized = localization.is_some(),
        "compiled table"
    );
    Ok(CompiledTable {
        name: name.to_string(),
        typed,
        binary,
        localization,
    })
}

fn localize(
    name: &str,
    raw: &RawTable,
    registry: &TypeRegistry,
) -> Result<Option<CompiledLocalization>, CompileError> {
    let hashed =
        LocalizationHashTable::extract(raw).map_err(|e| CompileError::localization(name, e))?;
    if hashed.is_empty() {
        return Ok(None);
    }
    let text_table =
        LocalizationTextTable::pivot(&hashed).map_err(|e| CompileError::localization(name, e))?;
    let hash_table = hashed
        .to_typed(registry)
        .map_err(|e| CompileError::localization(name, e))?;
    let binary = BinaryTable::encode(&hash_table).map_err(|e| CompileError::table(name, e))?;

    tracing::debug!(
        table = name,
        locales = hashed.locale_count(),
        entries = text_table.rows().len(),
        "extracted localization"
    );
    Ok(Some(CompiledLocalization {
        hash_table,
        binary,
        text_table,
    }))
}
