//! Build manifest: which sources to compile and how.
//!
//! Loaded from RON, JSON or TOML. Example (RON):
//!
//! ```ron
//! (
//!     sources: [
//!         (name: "item", path: "tables/item.csv"),
//!         (name: "string", path: "tables/string.ron"),
//!     ],
//!     output_dir: "build",
//!     enums: { "grade": { "COMMON": 0, "RARE": 1 } },
//!     extensions: [ron],
//! )
//! ```

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::loader::{DataLoadError, deserialize_file};

/// One source table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SourceEntry {
    /// Table name; also the stem of every output file.
    pub name: String,
    /// Source path, relative to the manifest's directory.
    pub path: PathBuf,
}

/// Structured-text column types that can be enabled per project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFormat {
    Ron,
    Toml,
}

impl DataFormat {
    /// Data type name used in type expressions.
    pub fn type_name(self) -> &'static str {
        match self {
            DataFormat::Ron => "ron",
            DataFormat::Toml => "toml",
        }
    }
}

/// A whole project build.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildManifest {
    pub sources: Vec<SourceEntry>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    /// Enum namespaces: namespace -> member name -> value.
    #[serde(default)]
    pub enums: HashMap<String, HashMap<String, i64>>,
    #[serde(default)]
    pub extensions: Vec<DataFormat>,
    /// Emit localization outputs for tables with decorated columns.
    #[serde(default = "default_true")]
    pub localization: bool,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("out")
}

fn default_true() -> bool {
    true
}

impl BuildManifest {
    /// A manifest with defaults for everything but the sources.
    pub fn new(sources: Vec<SourceEntry>) -> Self {
        Self {
            sources,
            output_dir: default_output_dir(),
            enums: HashMap::new(),
            extensions: Vec::new(),
            localization: true,
        }
    }

    /// Reject duplicate source names, which would overwrite each other's
    /// outputs.
    pub fn validate(&self, file: &Path) -> Result<(), DataLoadError> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if !seen.insert(source.name.as_str()) {
                return Err(DataLoadError::DuplicateName {
                    file: file.to_path_buf(),
                    name: source.name.clone(),
                });
            }
        }
        Ok(())
    }
}

/// Load and validate a manifest file.
pub fn load_manifest(path: &Path) -> Result<BuildManifest, DataLoadError> {
    let manifest: BuildManifest = deserialize_file(path)?;
    manifest.validate(path)?;
    tracing::debug!(
        file = %path.display(),
        sources = manifest.sources.len(),
        "loaded build manifest"
    );
    Ok(manifest)
}
