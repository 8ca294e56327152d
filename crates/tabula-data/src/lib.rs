//! File-facing side of Tabula: source readers, the build manifest,
//! structured-text column types and the project build driver.

pub mod build;
pub mod extensions;
pub mod loader;
pub mod manifest;

pub use build::{BuildError, BuildReport, TableReport, build_project, build_registry};
pub use loader::{DataLoadError, Format, load_raw_table};
pub use manifest::{BuildManifest, DataFormat, SourceEntry, load_manifest};
