//! Source readers: turn CSV / RON / JSON / TOML files into raw tables.
//!
//! Every format yields the same text grid: row 0 field names, row 1 type
//! expressions, the rest data. Cells are always strings; typing happens in
//! the compiler.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

use tabula_core::{RawTable, TableError};

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur while loading sources or the manifest.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The grid was read but is not a valid table.
    #[error("invalid table in {file}: {source}")]
    Table {
        file: PathBuf,
        #[source]
        source: TableError,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// An I/O error occurred.
    #[error("i/o error on {file}: {source}")]
    Io {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl DataLoadError {
    fn parse(file: &Path, detail: impl ToString) -> Self {
        DataLoadError::Parse {
            file: file.to_path_buf(),
            detail: detail.to_string(),
        }
    }

    pub(crate) fn io(file: &Path, source: std::io::Error) -> Self {
        DataLoadError::Io {
            file: file.to_path_buf(),
            source,
        }
    }
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported source file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("csv") => Ok(Format::Csv),
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// Deserialization
// ===========================================================================

/// TOML has no top-level arrays, so grids live under `rows`.
#[derive(Debug, Deserialize)]
struct TomlGrid {
    rows: Vec<Vec<String>>,
}

/// Read a file to a string, attaching the path to I/O errors.
pub(crate) fn read_text(path: &Path) -> Result<String, DataLoadError> {
    std::fs::read_to_string(path).map_err(|e| DataLoadError::io(path, e))
}

/// Deserialize a structured (RON / JSON / TOML) file by its extension.
pub fn deserialize_file<T: DeserializeOwned>(path: &Path) -> Result<T, DataLoadError> {
    let format = detect_format(path)?;
    let content = read_text(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| DataLoadError::parse(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| DataLoadError::parse(path, e)),
        Format::Toml => toml::from_str(&content).map_err(|e| DataLoadError::parse(path, e)),
        Format::Csv => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

/// Parse CSV text into rows. A leading UTF-8 BOM is dropped and rows may
/// differ in length.
pub fn parse_csv(content: &str, path: &Path) -> Result<Vec<Vec<String>>, DataLoadError> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    reader
        .records()
        .map(|record| {
            record
                .map(|r| r.iter().map(str::to_string).collect::<Vec<_>>())
                .map_err(|e| DataLoadError::parse(path, e))
        })
        .collect()
}

/// Read the text grid of a source file.
pub fn read_rows(path: &Path) -> Result<Vec<Vec<String>>, DataLoadError> {
    match detect_format(path)? {
        Format::Csv => parse_csv(&read_text(path)?, path),
        Format::Toml => deserialize_file::<TomlGrid>(path).map(|grid| grid.rows),
        Format::Ron | Format::Json => deserialize_file(path),
    }
}

/// Load a source file as a [`RawTable`].
pub fn load_raw_table(path: &Path) -> Result<RawTable, DataLoadError> {
    let rows = read_rows(path)?;
    let table = RawTable::from_rows(rows).map_err(|source| DataLoadError::Table {
        file: path.to_path_buf(),
        source,
    })?;
    tracing::debug!(
        file = %path.display(),
        columns = table.column_count(),
        rows = table.row_count(),
        "loaded source table"
    );
    Ok(table)
}

// ===========================================================================
// Tests
// ===========================================================================
