//! Tabula Core -- compiles spreadsheet-style design tables into typed,
//! binary-encoded tables for a game runtime.
//!
//! # Pipeline
//!
//! [`pipeline::compile`] runs one source table through these stages, each
//! returning a new immutable table:
//!
//! 1. **Compact** -- Drop decorated/metadata columns and comment/blank rows.
//! 2. **Convert** -- Resolve each column's type expression against the
//!    [`registry::TypeRegistry`] and convert every cell to a [`value::Value`].
//! 3. **Encode** -- Dump every value to bytes ([`binary::BinaryTable`]).
//! 4. **Localize** -- When `$field[locale]` columns exist, extract the
//!    adler32-keyed hash table and pivot it into a per-locale text table.
//!
//! ```rust,ignore
//! let registry = TypeRegistry::builtin();
//! let raw = RawTable::from_rows(rows)?;
//! let compiled = compile("item", &raw, &registry)?;
//! let bytes = write_artifact("item", &compiled.binary)?;
//! ```
//!
//! # Key Types
//!
//! - [`field_type::FieldType`] -- Resolved column type with its convert and
//!   dump strategies.
//! - [`registry::TypeRegistry`] -- Immutable base-type table, extended
//!   through [`registry::TypeRegistryBuilder`].
//! - [`table::Table`] -- Generic grid; [`table::RawTable`] and
//!   [`table::TypedTable`] are its two text/typed instantiations.
//! - [`hash::KeyHash`] -- Every key hash and digest a column can select.
//! - [`artifact`] -- Versioned `bitcode` container for compiled tables.

pub mod artifact;
pub mod binary;
pub mod compact;
pub mod convert;
pub mod field_type;
pub mod hash;
pub mod localization;
pub mod pipeline;
pub mod registry;
pub mod table;
pub mod value;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use pipeline::{CompileError, CompiledTable, compile};
pub use registry::{TypeRegistry, TypeRegistryBuilder};
pub use table::{RawTable, TableError, TypedTable};
pub use value::Value;
