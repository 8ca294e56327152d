//! Project build driver: manifest in, artifacts on disk out.
//!
//! Sources are loaded and compiled independently against one shared
//! registry (in parallel with the `parallel` feature), then written in
//! manifest order:
//!
//! - `<name>.tbl`: the compiled table artifact
//! - `<name>.l10n.tbl`: the localization hash table artifact
//! - `<name>.l10n.csv`: the per-locale text table for review

use std::path::{Path, PathBuf};

use tabula_core::artifact::{ARTIFACT_EXTENSION, ArtifactError, write_artifact};
use tabula_core::registry::{RegistryError, TypeRegistryBuilder};
use tabula_core::{CompileError, CompiledTable, RawTable, TypeRegistry, compile};

use crate::extensions::register_formats;
use crate::loader::{DataLoadError, load_raw_table};
use crate::manifest::{BuildManifest, SourceEntry};

/// Errors that abort a project build.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Load(#[from] DataLoadError),
    #[error("registry setup failed: {0}")]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Compile(#[from] CompileError),
    #[error("artifact for '{name}': {source}")]
    Artifact {
        name: String,
        #[source]
        source: ArtifactError,
    },
    #[error("writing {file}: {source}")]
    Write {
        file: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("writing csv {file}: {source}")]
    Csv {
        file: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// What one source produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub name: String,
    pub rows: usize,
    pub columns: usize,
    /// Pivoted localization rows, when the table has decorated columns.
    pub localized_entries: Option<usize>,
    pub outputs: Vec<PathBuf>,
}

/// Summary of a finished build, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    pub output_dir: PathBuf,
    pub tables: Vec<TableReport>,
}

impl BuildReport {
    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Every file written, in order.
    pub fn outputs(&self) -> impl Iterator<Item = &Path> {
        self.tables
            .iter()
            .flat_map(|t| t.outputs.iter().map(PathBuf::as_path))
    }
}

/// Registry with the manifest's enum namespaces and extension formats.
pub fn build_registry(manifest: &BuildManifest) -> Result<TypeRegistry, RegistryError> {
    let mut builder = TypeRegistryBuilder::new();
    register_formats(&mut builder, &manifest.extensions)?;

    // Sorted so registration errors are reproducible.
    let mut namespaces: Vec<_> = manifest.enums.iter().collect();
    namespaces.sort_by(|a, b| a.0.cmp(b.0));
    for (namespace, members) in namespaces {
        builder.register_enum(namespace, members.iter().map(|(k, v)| (k.as_str(), *v)))?;
    }
    Ok(builder.build())
}

/// Load and compile one source.
pub fn compile_source(
    source: &SourceEntry,
    base_dir: &Path,
    registry: &TypeRegistry,
) -> Result<CompiledTable, BuildError> {
    let raw: RawTable = load_raw_table(&base_dir.join(&source.path))?;
    Ok(compile(&source.name, &raw, registry)?)
}

#[cfg(feature = "parallel")]
fn compile_all(
    sources: &[SourceEntry],
    base_dir: &Path,
    registry: &TypeRegistry,
) -> Result<Vec<CompiledTable>, BuildError> {
    use rayon::prelude::*;

    sources
        .par_iter()
        .map(|source| compile_source(source, base_dir, registry))
        .collect()
}

#[cfg(not(feature = "parallel"))]
fn compile_all(
    sources: &[SourceEntry],
    base_dir: &Path,
    registry: &TypeRegistry,
) -> Result<Vec<CompiledTable>, BuildError> {
    sources
        .iter()
        .map(|source| compile_source(source, base_dir, registry))
        .collect()
}

/// Compile every source of `manifest` and write the outputs under
/// `base_dir/output_dir`. Paths in the manifest are relative to `base_dir`.
///
/// Nothing is written unless every source compiles.
pub fn build_project(manifest: &BuildManifest, base_dir: &Path) -> Result<BuildReport, BuildError> {
    let registry = build_registry(manifest)?;
    let compiled = compile_all(&manifest.sources, base_dir, &registry)?;

    let output_dir = base_dir.join(&manifest.output_dir);
    std::fs::create_dir_all(&output_dir).map_err(|e| DataLoadError::io(&output_dir, e))?;

    let mut report = BuildReport {
        output_dir: output_dir.clone(),
        tables: Vec::with_capacity(compiled.len()),
    };
    for table in &compiled {
        report
            .tables
            .push(write_outputs(table, &output_dir, manifest.localization)?);
    }

    tracing::info!(
        tables = report.tables.len(),
        files = report.outputs().count(),
        output_dir = %output_dir.display(),
        "build finished"
    );
    Ok(report)
}

fn write_outputs(
    table: &CompiledTable,
    output_dir: &Path,
    localization: bool,
) -> Result<TableReport, BuildError> {
    let name = &table.name;
    let mut outputs = Vec::new();

    let path = output_dir.join(format!("{name}.{ARTIFACT_EXTENSION}"));
    write_file(&path, &artifact_bytes(name, &table.binary)?)?;
    outputs.push(path);

    let mut localized_entries = None;
    if let Some(l10n) = table.localization.as_ref().filter(|_| localization) {
        let l10n_name = format!("{name}.l10n");

        let path = output_dir.join(format!("{l10n_name}.{ARTIFACT_EXTENSION}"));
        write_file(&path, &artifact_bytes(&l10n_name, &l10n.binary)?)?;
        outputs.push(path);

        let path = output_dir.join(format!("{l10n_name}.csv"));
        write_csv(&path, &l10n.text_table.to_raw())?;
        outputs.push(path);

        localized_entries = Some(l10n.text_table.rows().len());
    }

    tracing::debug!(table = %name, files = outputs.len(), "wrote outputs");
    Ok(TableReport {
        name: name.clone(),
        rows: table.binary.row_count(),
        columns: table.binary.column_count(),
        localized_entries,
        outputs,
    })
}

fn artifact_bytes(
    name: &str,
    binary: &tabula_core::binary::BinaryTable,
) -> Result<Vec<u8>, BuildError> {
    write_artifact(name, binary).map_err(|source| BuildError::Artifact {
        name: name.to_string(),
        source,
    })
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), BuildError> {
    std::fs::write(path, bytes).map_err(|source| BuildError::Write {
        file: path.to_path_buf(),
        source,
    })
}

/// Write a raw table as CSV: header row, type row, then records.
pub fn write_csv(path: &Path, table: &RawTable) -> Result<(), BuildError> {
    let csv_error = |source: csv::Error| BuildError::Csv {
        file: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_error)?;
    let rows = [table.field_names(), table.field_types()]
        .into_iter()
        .chain(table.records().iter().map(Vec::as_slice));
    for row in rows {
        writer.write_record(row).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| BuildError::Write {
        file: path.to_path_buf(),
        source,
    })
}
