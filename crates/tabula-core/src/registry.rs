//! Type registry: the base-type table consulted by the resolver.
//!
//! Two-phase lifecycle: a [`TypeRegistryBuilder`] accepts extension types
//! and enum namespaces, then [`TypeRegistryBuilder::build`] freezes it into
//! an immutable [`TypeRegistry`] that compilations share by reference.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::field_type::{
    ConversionFailure, ConvertFn, FieldType, SemanticType, StorageWidth, TypeError,
};
use crate::value::Value;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w+$").expect("identifier pattern is valid"));

/// Built-in data type names and their (semantic type, storage width).
const BUILTIN_TYPES: &[(&str, SemanticType, StorageWidth)] = &[
    ("json", SemanticType::Json, StorageWidth::Variable),
    ("str", SemanticType::String, StorageWidth::Variable),
    ("md5", SemanticType::Md5, StorageWidth::Fixed(crate::hash::MD5_LEN)),
    ("sha1", SemanticType::Sha1, StorageWidth::Fixed(crate::hash::SHA1_LEN)),
    ("sha256", SemanticType::Sha256, StorageWidth::Fixed(crate::hash::SHA256_LEN)),
    ("int", SemanticType::Int, StorageWidth::I32),
    ("int8", SemanticType::Int, StorageWidth::I8),
    ("int16", SemanticType::Int, StorageWidth::I16),
    ("int32", SemanticType::Int, StorageWidth::I32),
    ("int64", SemanticType::Int, StorageWidth::I64),
    ("uint", SemanticType::UInt, StorageWidth::U32),
    ("uint8", SemanticType::UInt, StorageWidth::U8),
    ("uint16", SemanticType::UInt, StorageWidth::U16),
    ("uint32", SemanticType::UInt, StorageWidth::U32),
    ("uint64", SemanticType::UInt, StorageWidth::U64),
    ("adler32", SemanticType::Adler32, StorageWidth::U32),
    ("crc32", SemanticType::Crc32, StorageWidth::U32),
    ("real", SemanticType::Real, StorageWidth::F32),
    ("real32", SemanticType::Real, StorageWidth::F32),
    ("real64", SemanticType::Real, StorageWidth::F64),
    ("date", SemanticType::Date, StorageWidth::Variable),
    ("datetime", SemanticType::DateTime, StorageWidth::Variable),
    ("span", SemanticType::TimeSpan, StorageWidth::Variable),
    ("time", SemanticType::TimeSpan, StorageWidth::Variable),
    ("enum", SemanticType::Enum, StorageWidth::I32),
];

/// Errors raised while registering types.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("data type '{0}' is already registered")]
    Duplicate(String),
    #[error("'{0}' is not a valid identifier")]
    InvalidName(String),
    #[error("enum namespace '{0}' is already registered")]
    DuplicateNamespace(String),
    #[error("enum '{namespace}' lists '{member}' twice")]
    DuplicateMember { namespace: String, member: String },
}

/// One entry of the base-type table.
#[derive(Clone)]
pub struct BaseType {
    pub semantic_type: SemanticType,
    pub storage_width: StorageWidth,
    /// Present for registered extensions; built-ins use the semantic type's
    /// default strategies.
    pub convert: Option<Arc<ConvertFn>>,
}

impl fmt::Debug for BaseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BaseType")
            .field("semantic_type", &self.semantic_type)
            .field("storage_width", &self.storage_width)
            .field("custom", &self.convert.is_some())
            .finish()
    }
}

/// Builder for constructing an immutable [`TypeRegistry`].
#[derive(Debug)]
pub struct TypeRegistryBuilder {
    base_types: HashMap<String, BaseType>,
    enums: HashMap<String, Arc<HashMap<String, i64>>>,
}

impl Default for TypeRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistryBuilder {
    /// A builder pre-populated with the built-in base types.
    pub fn new() -> Self {
        let base_types = BUILTIN_TYPES
            .iter()
            .map(|&(name, semantic_type, storage_width)| {
                (
                    name.to_string(),
                    BaseType {
                        semantic_type,
                        storage_width,
                        convert: None,
                    },
                )
            })
            .collect();
        Self {
            base_types,
            enums: HashMap::new(),
        }
    }

    /// Register an extension data type. `convert` receives the cell text and
    /// the expression's main/sub attributes; dumping follows the default for
    /// `semantic_type` at `storage_width`.
    pub fn register<F>(
        &mut self,
        name: &str,
        semantic_type: SemanticType,
        storage_width: StorageWidth,
        convert: F,
    ) -> Result<(), RegistryError>
    where
        F: Fn(&str, Option<&str>, Option<&str>) -> Result<Value, ConversionFailure>
            + Send
            + Sync
            + 'static,
    {
        if !IDENTIFIER.is_match(name) {
            return Err(RegistryError::InvalidName(name.to_string()));
        }
        if self.base_types.contains_key(name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }
        self.base_types.insert(
            name.to_string(),
            BaseType {
                semantic_type,
                storage_width,
                convert: Some(Arc::new(convert)),
            },
        );
        Ok(())
    }

    /// Register a namespace of named integer constants for `enum:<namespace>`.
    pub fn register_enum<I, S>(&mut self, namespace: &str, members: I) -> Result<(), RegistryError>
    where
        I: IntoIterator<Item = (S, i64)>,
        S: Into<String>,
    {
        if !IDENTIFIER.is_match(namespace) {
            return Err(RegistryError::InvalidName(namespace.to_string()));
        }
        if self.enums.contains_key(namespace) {
            return Err(RegistryError::DuplicateNamespace(namespace.to_string()));
        }
        let mut map = HashMap::new();
        for (member, value) in members {
            let member = member.into();
            if map.contains_key(&member) {
                return Err(RegistryError::DuplicateMember {
                    namespace: namespace.to_string(),
                    member,
                });
            }
            map.insert(member, value);
        }
        self.enums.insert(namespace.to_string(), Arc::new(map));
        Ok(())
    }

    /// Freeze the registry.
    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            base_types: self.base_types,
            enums: self.enums,
        }
    }
}

/// Immutable type registry. Frozen after `build()`; `Send + Sync`.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    base_types: HashMap<String, BaseType>,
    enums: HashMap<String, Arc<HashMap<String, i64>>>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TypeRegistry {
    /// Registry with only the built-in types.
    pub fn builtin() -> Self {
        TypeRegistryBuilder::new().build()
    }

    pub fn base_type(&self, name: &str) -> Option<&BaseType> {
        self.base_types.get(name)
    }

    pub fn enum_members(&self, namespace: &str) -> Option<&Arc<HashMap<String, i64>>> {
        self.enums.get(namespace)
    }

    /// Number of registered base types.
    pub fn type_count(&self) -> usize {
        self.base_types.len()
    }

    /// Resolve one type expression.
    pub fn resolve(&self, expr: &str) -> Result<FieldType, TypeError> {
        FieldType::resolve(expr, self)
    }

    /// Resolve a whole type row, tagging failures with the column index.
    pub fn resolve_all<S: AsRef<str>>(&self, exprs: &[S]) -> Result<Vec<FieldType>, TypeError> {
        exprs
            .iter()
            .enumerate()
            .map(|(col, expr)| {
                self.resolve(expr.as_ref()).map_err(|e| TypeError::Column {
                    col,
                    source: Box::new(e),
                })
            })
            .collect()
    }
}
