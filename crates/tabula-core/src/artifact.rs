//! Versioned on-disk container for compiled tables.
//!
//! A [`TableArtifact`] bundles a [`BinaryTable`] with its name and a header
//! carrying a magic number and format version, serialized with `bitcode`.
//! Readers validate the header before handing out the table.

use serde::{Deserialize, Serialize};

use crate::binary::BinaryTable;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Magic number identifying a compiled table artifact.
pub const ARTIFACT_MAGIC: u32 = 0x7AB1_0001;

/// Current format version. Increment when breaking the wire format.
pub const FORMAT_VERSION: u32 = 1;

/// Conventional file extension for artifacts.
pub const ARTIFACT_EXTENSION: &str = "tbl";

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur while reading or writing an artifact.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("bitcode decoding failed: {0}")]
    Decode(String),
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", ARTIFACT_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("unsupported format version: expected {}, got {}", FORMAT_VERSION, .0)]
    UnsupportedVersion(u32),
    #[error("artifact from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
}

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Header stored with every artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub magic: u32,
    pub version: u32,
    pub row_count: u64,
    pub column_count: u32,
}

impl ArtifactHeader {
    /// Header for `binary` at the current format version.
    pub fn for_table(binary: &BinaryTable) -> Self {
        Self {
            magic: ARTIFACT_MAGIC,
            version: FORMAT_VERSION,
            row_count: binary.row_count() as u64,
            column_count: binary.column_count() as u32,
        }
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.magic != ARTIFACT_MAGIC {
            return Err(ArtifactError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(ArtifactError::FutureVersion(self.version));
        }
        if self.version < FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion(self.version));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// A named binary table ready to be written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableArtifact {
    pub header: ArtifactHeader,
    pub name: String,
    pub binary: BinaryTable,
}

impl TableArtifact {
    pub fn new(name: impl Into<String>, binary: BinaryTable) -> Self {
        Self {
            header: ArtifactHeader::for_table(&binary),
            name: name.into(),
            binary,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArtifactError> {
        bitcode::serialize(self).map_err(|e| ArtifactError::Encode(e.to_string()))
    }
}

/// Serialize `binary` under `name` into artifact bytes.
pub fn write_artifact(name: &str, binary: &BinaryTable) -> Result<Vec<u8>, ArtifactError> {
    TableArtifact::new(name, binary.clone()).to_bytes()
}

/// Decode and validate artifact bytes.
pub fn read_artifact(data: &[u8]) -> Result<TableArtifact, ArtifactError> {
    let artifact: TableArtifact =
        bitcode::deserialize(data).map_err(|e| ArtifactError::Decode(e.to_string()))?;
    artifact.header.validate()?;
    Ok(artifact)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BinaryTable {
        BinaryTable {
            field_names: vec![b"id".to_vec(), b"name".to_vec()],
            field_types: vec![b"int".to_vec(), b"str".to_vec()],
            records: vec![
                vec![1i32.to_le_bytes().to_vec(), b"Alice".to_vec()],
                vec![2i32.to_le_bytes().to_vec(), b"Bob".to_vec()],
            ],
        }
    }

    #[test]
    fn written_artifact_reads_back() {
        let bytes = write_artifact("item", &sample()).unwrap();
        let artifact = read_artifact(&bytes).unwrap();
        assert_eq!(artifact.name, "item");
        assert_eq!(artifact.binary, sample());
        assert_eq!(artifact.header.row_count, 2);
        assert_eq!(artifact.header.column_count, 2);
    }

    #[test]
    fn wrong_magic_is_rejected() {
        let mut artifact = TableArtifact::new("item", sample());
        artifact.header.magic = 0xDEAD_BEEF;
        let bytes = artifact.to_bytes().unwrap();
        assert!(matches!(
            read_artifact(&bytes),
            Err(ArtifactError::InvalidMagic(0xDEAD_BEEF))
        ));
    }

    #[test]
    fn version_mismatch_is_rejected() {
        let mut artifact = TableArtifact::new("item", sample());
        artifact.header.version = FORMAT_VERSION + 1;
        let bytes = artifact.to_bytes().unwrap();
        assert!(matches!(
            read_artifact(&bytes),
            Err(ArtifactError::FutureVersion(_))
        ));

        artifact.header.version = 0;
        let bytes = artifact.to_bytes().unwrap();
        assert!(matches!(
            read_artifact(&bytes),
            Err(ArtifactError::UnsupportedVersion(0))
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        assert!(matches!(
            read_artifact(&[0xFF, 0x00, 0x13]),
            Err(ArtifactError::Decode(_))
        ));
    }
}
