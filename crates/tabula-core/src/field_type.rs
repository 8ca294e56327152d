//! Column type expressions and their resolved convert/dump strategies.
//!
//! A type expression has the shape `data_type[:main_attr[:sub_attr]]`:
//!
//! ```text
//! int            plain 32-bit signed integer
//! int:hex        base-16 text
//! int:fk:User.id foreign key into User.id
//! str:pk:md5     primary key, stored as an MD5 digest
//! str:ascii:replace
//! ```
//!
//! Resolution runs once per column and produces an immutable [`FieldType`]
//! carrying both strategies, so per-cell work is a single `match`.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use regex::Regex;

use crate::hash::KeyHash;
use crate::registry::TypeRegistry;
use crate::value::{DATE_FORMAT, DATETIME_FORMAT, TIME_FORMAT, Value};

// ===========================================================================
// Semantic type / storage width
// ===========================================================================

/// Logical value kind of a column, independent of how it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SemanticType {
    Json,
    String,
    Md5,
    Sha1,
    Sha256,
    Int,
    UInt,
    Adler32,
    Crc32,
    Real,
    Date,
    DateTime,
    TimeSpan,
    /// Named integer constants looked up in a registry namespace.
    Enum,
}

impl SemanticType {
    pub fn name(self) -> &'static str {
        match self {
            SemanticType::Json => "json",
            SemanticType::String => "string",
            SemanticType::Md5 => "md5",
            SemanticType::Sha1 => "sha1",
            SemanticType::Sha256 => "sha256",
            SemanticType::Int => "int",
            SemanticType::UInt => "uint",
            SemanticType::Adler32 => "adler32",
            SemanticType::Crc32 => "crc32",
            SemanticType::Real => "real",
            SemanticType::Date => "date",
            SemanticType::DateTime => "datetime",
            SemanticType::TimeSpan => "timespan",
            SemanticType::Enum => "enum",
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Binary layout used when a value is dumped. Numbers are little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageWidth {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    /// Fixed-length byte array (digests).
    Fixed(usize),
    /// Variable-length bytes (text, dates, JSON).
    Variable,
}

impl StorageWidth {
    /// Encoded size in bytes, `None` for variable-length storage.
    pub fn byte_len(self) -> Option<usize> {
        match self {
            StorageWidth::I8 | StorageWidth::U8 => Some(1),
            StorageWidth::I16 | StorageWidth::U16 => Some(2),
            StorageWidth::I32 | StorageWidth::U32 | StorageWidth::F32 => Some(4),
            StorageWidth::I64 | StorageWidth::U64 | StorageWidth::F64 => Some(8),
            StorageWidth::Fixed(n) => Some(n),
            StorageWidth::Variable => None,
        }
    }

    /// Inclusive integer range representable at this width.
    pub fn int_bounds(self) -> Option<(i128, i128)> {
        match self {
            StorageWidth::I8 => Some((i8::MIN as i128, i8::MAX as i128)),
            StorageWidth::I16 => Some((i16::MIN as i128, i16::MAX as i128)),
            StorageWidth::I32 => Some((i32::MIN as i128, i32::MAX as i128)),
            StorageWidth::I64 => Some((i64::MIN as i128, i64::MAX as i128)),
            StorageWidth::U8 => Some((0, u8::MAX as i128)),
            StorageWidth::U16 => Some((0, u16::MAX as i128)),
            StorageWidth::U32 => Some((0, u32::MAX as i128)),
            StorageWidth::U64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            StorageWidth::U8 | StorageWidth::U16 | StorageWidth::U32 | StorageWidth::U64
        )
    }
}

impl fmt::Display for StorageWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageWidth::I8 => f.write_str("i8"),
            StorageWidth::I16 => f.write_str("i16"),
            StorageWidth::I32 => f.write_str("i32"),
            StorageWidth::I64 => f.write_str("i64"),
            StorageWidth::U8 => f.write_str("u8"),
            StorageWidth::U16 => f.write_str("u16"),
            StorageWidth::U32 => f.write_str("u32"),
            StorageWidth::U64 => f.write_str("u64"),
            StorageWidth::F32 => f.write_str("f32"),
            StorageWidth::F64 => f.write_str("f64"),
            StorageWidth::Fixed(n) => write!(f, "[u8; {n}]"),
            StorageWidth::Variable => f.write_str("bytes"),
        }
    }
}

// ===========================================================================
// Modifiers
// ===========================================================================

/// Key role assigned by the `key` / `pk` / `fk` modifiers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum KeyRole {
    #[default]
    None,
    /// `str:key`: lookup key, value kept as text.
    Lookup,
    Primary,
    /// Foreign key; `target` is the `Table.column` named in the sub-attribute.
    Foreign { target: Option<String> },
}

/// Text encodings selectable with `str:<encoding>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Utf8,
    /// UTF-16 little-endian, no byte-order mark.
    Utf16,
    Ascii,
}

impl TextEncoding {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "utf8" => Some(TextEncoding::Utf8),
            "utf16" => Some(TextEncoding::Utf16),
            "ascii" => Some(TextEncoding::Ascii),
            _ => None,
        }
    }
}

/// What to do with characters the target encoding cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ErrorPolicy {
    #[default]
    Strict,
    Ignore,
    /// Substitute `?`.
    Replace,
}

impl ErrorPolicy {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "strict" => Some(ErrorPolicy::Strict),
            "ignore" => Some(ErrorPolicy::Ignore),
            "replace" => Some(ErrorPolicy::Replace),
            _ => None,
        }
    }
}

// ===========================================================================
// Errors
// ===========================================================================

/// Errors raised while resolving a type expression.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    #[error("malformed type expression '{expr}'")]
    MalformedExpression { expr: String },

    #[error("unknown data type in '{expr}'")]
    UnknownDataType { expr: String },

    #[error("unknown main attribute '{attr}' for {semantic_type}")]
    UnknownMainAttribute {
        semantic_type: SemanticType,
        attr: String,
    },

    #[error("unknown sub attribute '{sub_attr}' for {semantic_type}:{main_attr}")]
    UnknownSubAttribute {
        semantic_type: SemanticType,
        main_attr: String,
        sub_attr: String,
    },

    #[error("type expression '{expr}' requires a main attribute")]
    MissingMainAttribute { expr: String },

    #[error("unknown enum namespace '{namespace}'")]
    UnknownEnumNamespace { namespace: String },

    #[error("column {col}: {source}")]
    Column {
        col: usize,
        #[source]
        source: Box<TypeError>,
    },
}

/// Machine-readable reason attached to a failed cell conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Underflow,
    Overflow,
    Unknown,
    InvalidNumber,
    InvalidReal,
    InvalidDate,
    InvalidDateTime,
    InvalidTime,
    InvalidJson,
    Encoding,
    /// Raised by a registered extension converter.
    Custom,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureKind::Underflow => "UNDERFLOW",
            FailureKind::Overflow => "OVERFLOW",
            FailureKind::Unknown => "UNKNOWN",
            FailureKind::InvalidNumber => "INVALID_NUMBER",
            FailureKind::InvalidReal => "INVALID_REAL",
            FailureKind::InvalidDate => "INVALID_DATE",
            FailureKind::InvalidDateTime => "INVALID_DATETIME",
            FailureKind::InvalidTime => "INVALID_TIME",
            FailureKind::InvalidJson => "INVALID_JSON",
            FailureKind::Encoding => "ENCODING",
            FailureKind::Custom => "CUSTOM",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single cell that could not be converted. Carries no location; the
/// table stage attaches row and column.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: '{value}' ({memo})")]
pub struct ConversionFailure {
    pub kind: FailureKind,
    pub value: String,
    pub memo: String,
}

impl ConversionFailure {
    pub fn new(kind: FailureKind, value: &str, memo: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.to_string(),
            memo: memo.into(),
        }
    }
}

/// A typed value could not be dumped with the column's strategy.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DumpError {
    #[error("expected a {expected} value, found {found}")]
    ValueMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("value {value} does not fit {width}")]
    OutOfRange { value: String, width: StorageWidth },

    #[error("character at position {position} is not representable in ascii")]
    Encoding { position: usize },
}

// ===========================================================================
// Strategies
// ===========================================================================

/// Signature of a registered extension converter: `(text, main_attr, sub_attr)`.
pub type ConvertFn =
    dyn Fn(&str, Option<&str>, Option<&str>) -> Result<Value, ConversionFailure> + Send + Sync;

/// How a cell's text becomes a [`Value`].
#[derive(Clone)]
pub enum ConvertStrategy {
    Integer { radix: u32, width: StorageWidth },
    Real { width: StorageWidth },
    Text,
    /// Text checked against an encoding; stays `Value::Text`.
    Encoded {
        encoding: TextEncoding,
        policy: ErrorPolicy,
    },
    Hash(KeyHash),
    Date,
    DateTime,
    Time,
    Json,
    Enum {
        namespace: String,
        members: Arc<HashMap<String, i64>>,
    },
    Custom(Arc<ConvertFn>),
}

impl fmt::Debug for ConvertStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertStrategy::Integer { radix, width } => f
                .debug_struct("Integer")
                .field("radix", radix)
                .field("width", width)
                .finish(),
            ConvertStrategy::Real { width } => f.debug_struct("Real").field("width", width).finish(),
            ConvertStrategy::Text => f.write_str("Text"),
            ConvertStrategy::Encoded { encoding, policy } => f
                .debug_struct("Encoded")
                .field("encoding", encoding)
                .field("policy", policy)
                .finish(),
            ConvertStrategy::Hash(hash) => f.debug_tuple("Hash").field(hash).finish(),
            ConvertStrategy::Date => f.write_str("Date"),
            ConvertStrategy::DateTime => f.write_str("DateTime"),
            ConvertStrategy::Time => f.write_str("Time"),
            ConvertStrategy::Json => f.write_str("Json"),
            ConvertStrategy::Enum { namespace, .. } => {
                f.debug_struct("Enum").field("namespace", namespace).finish()
            }
            ConvertStrategy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// How a [`Value`] becomes bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DumpStrategy {
    /// Fixed-width little-endian integer.
    Int(StorageWidth),
    /// Little-endian IEEE float.
    Real(StorageWidth),
    Text {
        encoding: TextEncoding,
        policy: ErrorPolicy,
    },
    /// Bytes already produced by the converter (digests).
    Raw,
    /// Date-family values as their canonical text, UTF-8 encoded.
    CanonicalText,
    /// Compact JSON serialization, UTF-8 encoded.
    Json,
}

impl DumpStrategy {
    /// Default dump for a semantic type stored at `width`.
    pub fn default_for(semantic_type: SemanticType, width: StorageWidth) -> Self {
        match semantic_type {
            SemanticType::Int | SemanticType::UInt | SemanticType::Enum => DumpStrategy::Int(width),
            SemanticType::Adler32 | SemanticType::Crc32 => DumpStrategy::Int(StorageWidth::U32),
            SemanticType::Real => DumpStrategy::Real(width),
            SemanticType::String => DumpStrategy::Text {
                encoding: TextEncoding::Utf8,
                policy: ErrorPolicy::Strict,
            },
            SemanticType::Md5 | SemanticType::Sha1 | SemanticType::Sha256 => DumpStrategy::Raw,
            SemanticType::Date | SemanticType::DateTime | SemanticType::TimeSpan => {
                DumpStrategy::CanonicalText
            }
            SemanticType::Json => DumpStrategy::Json,
        }
    }
}

// ===========================================================================
// Expression grammar
// ===========================================================================

static TYPE_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)(?::([^:]+)(?::(.+))?)?$").expect("type expression pattern is valid")
});

/// The three parts of a type expression, borrowed from the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TypeExpr<'a> {
    pub data_type: &'a str,
    pub main_attr: Option<&'a str>,
    pub sub_attr: Option<&'a str>,
}

impl<'a> TypeExpr<'a> {
    /// Split an expression into its parts. Surrounding whitespace is ignored.
    pub fn parse(expr: &'a str) -> Result<Self, TypeError> {
        let caps = TYPE_EXPR
            .captures(expr.trim())
            .ok_or_else(|| TypeError::MalformedExpression {
                expr: expr.to_string(),
            })?;
        let part = |i| caps.get(i).map(|m: regex::Match<'a>| m.as_str());
        Ok(Self {
            data_type: part(1).unwrap_or_default(),
            main_attr: part(2),
            sub_attr: part(3),
        })
    }
}

// ===========================================================================
// FieldType
// ===========================================================================

/// Resolved descriptor for one column.
#[derive(Debug, Clone)]
pub struct FieldType {
    expr: String,
    semantic_type: SemanticType,
    storage_width: StorageWidth,
    main_attr: Option<String>,
    sub_attr: Option<String>,
    role: KeyRole,
    convert: ConvertStrategy,
    dump: DumpStrategy,
}

impl PartialEq for FieldType {
    /// Strategies are a function of these fields for a given registry.
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
            && self.semantic_type == other.semantic_type
            && self.storage_width == other.storage_width
            && self.role == other.role
            && self.dump == other.dump
    }
}

/// Partially resolved column, before the modifier step fills in strategies.
struct Resolution {
    storage_width: StorageWidth,
    role: KeyRole,
    convert: ConvertStrategy,
    dump: DumpStrategy,
}

impl FieldType {
    /// Resolve `expr` against `registry`:
    ///
    /// 1. base-type lookup of the data type name,
    /// 2. `(semantic_type, main_attr)` modifier lookup, if a main attribute
    ///    is present,
    /// 3. otherwise the semantic type's defaults.
    pub fn resolve(expr: &str, registry: &TypeRegistry) -> Result<Self, TypeError> {
        let parsed = TypeExpr::parse(expr)?;
        let base = registry
            .base_type(parsed.data_type)
            .ok_or_else(|| TypeError::UnknownDataType {
                expr: expr.to_string(),
            })?;
        let semantic_type = base.semantic_type;
        let width = base.storage_width;

        let resolution = if let Some(custom) = &base.convert {
            // Extensions receive their attributes verbatim.
            Resolution {
                storage_width: width,
                role: KeyRole::None,
                convert: ConvertStrategy::Custom(Arc::clone(custom)),
                dump: DumpStrategy::default_for(semantic_type, width),
            }
        } else if semantic_type == SemanticType::Enum {
            resolve_enum(expr, parsed, width, registry)?
        } else if let Some(main_attr) = parsed.main_attr {
            resolve_modifier(semantic_type, width, main_attr, parsed.sub_attr)?
        } else {
            Resolution {
                storage_width: width,
                role: KeyRole::None,
                convert: default_convert(semantic_type, width),
                dump: DumpStrategy::default_for(semantic_type, width),
            }
        };

        Ok(Self {
            expr: expr.trim().to_string(),
            semantic_type,
            storage_width: resolution.storage_width,
            main_attr: parsed.main_attr.map(str::to_string),
            sub_attr: parsed.sub_attr.map(str::to_string),
            role: resolution.role,
            convert: resolution.convert,
            dump: resolution.dump,
        })
    }

    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn semantic_type(&self) -> SemanticType {
        self.semantic_type
    }

    pub fn storage_width(&self) -> StorageWidth {
        self.storage_width
    }

    pub fn main_attr(&self) -> Option<&str> {
        self.main_attr.as_deref()
    }

    pub fn sub_attr(&self) -> Option<&str> {
        self.sub_attr.as_deref()
    }

    pub fn role(&self) -> &KeyRole {
        &self.role
    }

    pub fn convert_strategy(&self) -> &ConvertStrategy {
        &self.convert
    }

    pub fn dump_strategy(&self) -> DumpStrategy {
        self.dump
    }

    /// Convert one cell's text into a typed value.
    pub fn convert(&self, text: &str) -> Result<Value, ConversionFailure> {
        match &self.convert {
            ConvertStrategy::Integer { radix, width } => convert_integer(text, *radix, *width),
            ConvertStrategy::Real { width } => convert_real(text, *width),
            ConvertStrategy::Text => Ok(Value::Text(text.to_string())),
            ConvertStrategy::Encoded { encoding, policy } => {
                check_encodable(text, *encoding, *policy)?;
                Ok(Value::Text(text.to_string()))
            }
            ConvertStrategy::Hash(hash) => Ok(hash.digest(text)),
            ConvertStrategy::Date => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
                .map(Value::Date)
                .map_err(|e| ConversionFailure::new(FailureKind::InvalidDate, text, e.to_string())),
            ConvertStrategy::DateTime => {
                NaiveDateTime::parse_from_str(text.trim(), DATETIME_FORMAT)
                    .map(Value::DateTime)
                    .map_err(|e| {
                        ConversionFailure::new(FailureKind::InvalidDateTime, text, e.to_string())
                    })
            }
            ConvertStrategy::Time => NaiveTime::parse_from_str(text.trim(), TIME_FORMAT)
                .map(|t| Value::Span(TimeDelta::seconds(t.num_seconds_from_midnight() as i64)))
                .map_err(|e| ConversionFailure::new(FailureKind::InvalidTime, text, e.to_string())),
            ConvertStrategy::Json => serde_json::from_str(text)
                .map(Value::Json)
                .map_err(|e| ConversionFailure::new(FailureKind::InvalidJson, text, e.to_string())),
            ConvertStrategy::Enum { namespace, members } => members
                .get(text.trim())
                .map(|v| Value::Int(*v))
                .ok_or_else(|| {
                    ConversionFailure::new(
                        FailureKind::Unknown,
                        text,
                        format!("not in enum '{namespace}'"),
                    )
                }),
            ConvertStrategy::Custom(func) => {
                func(text, self.main_attr.as_deref(), self.sub_attr.as_deref())
            }
        }
    }

    /// Encode a value produced by [`FieldType::convert`].
    pub fn dump(&self, value: &Value) -> Result<Vec<u8>, DumpError> {
        match self.dump {
            DumpStrategy::Int(width) => dump_integer(value, width),
            DumpStrategy::Real(width) => match value {
                Value::Real(v) if width == StorageWidth::F64 => Ok(v.to_le_bytes().to_vec()),
                Value::Real(v) => Ok((*v as f32).to_le_bytes().to_vec()),
                other => Err(mismatch("real", other)),
            },
            DumpStrategy::Text { encoding, policy } => match value {
                Value::Text(s) => encode_text(s, encoding, policy),
                other => Err(mismatch("text", other)),
            },
            DumpStrategy::Raw => match value {
                Value::Bytes(bytes) => Ok(bytes.clone()),
                other => Err(mismatch("bytes", other)),
            },
            DumpStrategy::CanonicalText => match value {
                Value::Date(_) | Value::DateTime(_) | Value::Span(_) | Value::Text(_) => {
                    Ok(value.to_string().into_bytes())
                }
                other => Err(mismatch("date", other)),
            },
            DumpStrategy::Json => match value {
                Value::Json(json) => Ok(json.to_string().into_bytes()),
                other => Err(mismatch("json", other)),
            },
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

// ===========================================================================
// Resolution helpers
// ===========================================================================

fn default_convert(semantic_type: SemanticType, width: StorageWidth) -> ConvertStrategy {
    match semantic_type {
        SemanticType::Json => ConvertStrategy::Json,
        SemanticType::String => ConvertStrategy::Text,
        SemanticType::Md5 => ConvertStrategy::Hash(KeyHash::Md5),
        SemanticType::Sha1 => ConvertStrategy::Hash(KeyHash::Sha1),
        SemanticType::Sha256 => ConvertStrategy::Hash(KeyHash::Sha256),
        SemanticType::Adler32 => ConvertStrategy::Hash(KeyHash::Adler32),
        SemanticType::Crc32 => ConvertStrategy::Hash(KeyHash::Crc32),
        SemanticType::Int | SemanticType::UInt | SemanticType::Enum => {
            ConvertStrategy::Integer { radix: 10, width }
        }
        SemanticType::Real => ConvertStrategy::Real { width },
        SemanticType::Date => ConvertStrategy::Date,
        SemanticType::DateTime => ConvertStrategy::DateTime,
        SemanticType::TimeSpan => ConvertStrategy::Time,
    }
}

/// Storage and dump for a value produced by `hash`.
fn hash_layout(hash: KeyHash) -> (StorageWidth, DumpStrategy) {
    match hash {
        KeyHash::Hash64 => (StorageWidth::U64, DumpStrategy::Int(StorageWidth::U64)),
        KeyHash::Hash32 | KeyHash::Adler32 | KeyHash::Crc32 => {
            (StorageWidth::U32, DumpStrategy::Int(StorageWidth::U32))
        }
        KeyHash::Md5 | KeyHash::Sha1 | KeyHash::Sha256 => {
            (StorageWidth::Fixed(hash.width()), DumpStrategy::Raw)
        }
    }
}

fn hashed(hash: KeyHash, role: KeyRole) -> Resolution {
    let (storage_width, dump) = hash_layout(hash);
    Resolution {
        storage_width,
        role,
        convert: ConvertStrategy::Hash(hash),
        dump,
    }
}

fn resolve_modifier(
    semantic_type: SemanticType,
    width: StorageWidth,
    main_attr: &str,
    sub_attr: Option<&str>,
) -> Result<Resolution, TypeError> {
    let unknown_main = || TypeError::UnknownMainAttribute {
        semantic_type,
        attr: main_attr.to_string(),
    };
    let unknown_sub = |sub: &str| TypeError::UnknownSubAttribute {
        semantic_type,
        main_attr: main_attr.to_string(),
        sub_attr: sub.to_string(),
    };

    match semantic_type {
        SemanticType::Int | SemanticType::UInt => {
            let integer = |radix, role| Resolution {
                storage_width: width,
                role,
                convert: ConvertStrategy::Integer { radix, width },
                dump: DumpStrategy::Int(width),
            };
            let resolution = match main_attr {
                "bin" => integer(2, KeyRole::None),
                "oct" => integer(8, KeyRole::None),
                "hex" => integer(16, KeyRole::None),
                "pk" => integer(10, KeyRole::Primary),
                "fk" => {
                    return Ok(integer(
                        10,
                        KeyRole::Foreign {
                            target: sub_attr.map(str::to_string),
                        },
                    ));
                }
                radix => match radix.parse::<u32>() {
                    Ok(r) if (2..=36).contains(&r) => integer(r, KeyRole::None),
                    _ => return Err(unknown_main()),
                },
            };
            // Only `fk` takes a sub-attribute (its target).
            match sub_attr {
                Some(sub) => Err(unknown_sub(sub)),
                None => Ok(resolution),
            }
        }
        SemanticType::String => {
            if main_attr == "key" {
                if let Some(sub) = sub_attr {
                    return Err(unknown_sub(sub));
                }
                return Ok(Resolution {
                    storage_width: width,
                    role: KeyRole::Lookup,
                    convert: ConvertStrategy::Text,
                    dump: DumpStrategy::default_for(semantic_type, width),
                });
            }
            if main_attr == "pk" || main_attr == "fk" {
                let chosen = sub_attr.and_then(KeyHash::from_name);
                let role = match (main_attr, sub_attr, chosen) {
                    ("pk", Some(sub), None) => return Err(unknown_sub(sub)),
                    ("pk", _, _) => KeyRole::Primary,
                    (_, Some(target), None) => KeyRole::Foreign {
                        target: Some(target.to_string()),
                    },
                    _ => KeyRole::Foreign { target: None },
                };
                return Ok(hashed(chosen.unwrap_or(KeyHash::Adler32), role));
            }
            if let Some(hash) = KeyHash::from_name(main_attr) {
                if let Some(sub) = sub_attr {
                    return Err(unknown_sub(sub));
                }
                return Ok(hashed(hash, KeyRole::None));
            }
            if let Some(encoding) = TextEncoding::from_name(main_attr) {
                let policy = match sub_attr {
                    None => ErrorPolicy::Strict,
                    Some(sub) => ErrorPolicy::from_name(sub).ok_or_else(|| unknown_sub(sub))?,
                };
                return Ok(Resolution {
                    storage_width: width,
                    role: KeyRole::None,
                    convert: ConvertStrategy::Encoded { encoding, policy },
                    dump: DumpStrategy::Text { encoding, policy },
                });
            }
            Err(unknown_main())
        }
        _ => Err(unknown_main()),
    }
}

fn resolve_enum(
    expr: &str,
    parsed: TypeExpr<'_>,
    width: StorageWidth,
    registry: &TypeRegistry,
) -> Result<Resolution, TypeError> {
    let namespace = parsed
        .main_attr
        .ok_or_else(|| TypeError::MissingMainAttribute {
            expr: expr.to_string(),
        })?;
    let members = registry
        .enum_members(namespace)
        .ok_or_else(|| TypeError::UnknownEnumNamespace {
            namespace: namespace.to_string(),
        })?;
    Ok(Resolution {
        storage_width: width,
        role: KeyRole::None,
        convert: ConvertStrategy::Enum {
            namespace: namespace.to_string(),
            members: Arc::clone(members),
        },
        dump: DumpStrategy::Int(width),
    })
}

// ===========================================================================
// Convert helpers
// ===========================================================================

fn convert_integer(text: &str, radix: u32, width: StorageWidth) -> Result<Value, ConversionFailure> {
    use std::num::IntErrorKind;

    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let prefix = match radix {
        2 => Some(["0b", "0B"]),
        8 => Some(["0o", "0O"]),
        16 => Some(["0x", "0X"]),
        _ => None,
    };
    let digits = prefix
        .and_then(|p| p.iter().find_map(|p| digits.strip_prefix(p)))
        .unwrap_or(digits);
    if digits.starts_with(['+', '-']) {
        return Err(ConversionFailure::new(
            FailureKind::InvalidNumber,
            text,
            "misplaced sign",
        ));
    }

    let magnitude = i128::from_str_radix(digits, radix).map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow if negative => {
            ConversionFailure::new(FailureKind::Underflow, text, "exceeds 128 bits")
        }
        IntErrorKind::PosOverflow => {
            ConversionFailure::new(FailureKind::Overflow, text, "exceeds 128 bits")
        }
        _ => ConversionFailure::new(FailureKind::InvalidNumber, text, e.to_string()),
    })?;
    let value = if negative { -magnitude } else { magnitude };

    let (min, max) = width.int_bounds().unwrap_or((i64::MIN as i128, i64::MAX as i128));
    if value < min {
        return Err(ConversionFailure::new(
            FailureKind::Underflow,
            text,
            format!("< {min}"),
        ));
    }
    if value > max {
        return Err(ConversionFailure::new(
            FailureKind::Overflow,
            text,
            format!("> {max}"),
        ));
    }

    // Bounds were checked against the width, so the casts are lossless.
    if width.is_unsigned() {
        Ok(Value::UInt(value as u64))
    } else {
        Ok(Value::Int(value as i64))
    }
}

fn convert_real(text: &str, width: StorageWidth) -> Result<Value, ConversionFailure> {
    let trimmed = text.trim();
    let value: f64 = trimmed.parse().map_err(|e: std::num::ParseFloatError| {
        ConversionFailure::new(FailureKind::InvalidReal, text, e.to_string())
    })?;
    if !value.is_finite() && is_special_real(trimmed) {
        return Ok(Value::Real(value));
    }

    let (stored, range) = match width {
        StorageWidth::F64 => (value, "f64"),
        _ => (value as f32 as f64, "f32"),
    };
    let too_large =
        !value.is_finite() || (width != StorageWidth::F64 && value.abs() > f32::MAX as f64);
    if too_large {
        let kind = if value < 0.0 {
            FailureKind::Underflow
        } else {
            FailureKind::Overflow
        };
        return Err(ConversionFailure::new(kind, text, format!("outside {range} range")));
    }
    let lost = stored == 0.0 && has_nonzero_mantissa(trimmed);
    let denormal = match width {
        StorageWidth::F64 => stored.is_subnormal(),
        _ => (stored as f32).is_subnormal(),
    };
    if lost || denormal {
        return Err(ConversionFailure::new(
            FailureKind::Underflow,
            text,
            format!("below smallest normal {range}"),
        ));
    }
    // F32 columns hold the f32-rounded value so it equals what the dump stores.
    Ok(Value::Real(stored))
}

/// Literal infinity or NaN spellings accepted by `f64::from_str`.
fn is_special_real(text: &str) -> bool {
    let unsigned = text.trim_start_matches(['+', '-']).to_ascii_lowercase();
    matches!(unsigned.as_str(), "inf" | "infinity" | "nan")
}

fn has_nonzero_mantissa(text: &str) -> bool {
    text.split(['e', 'E'])
        .next()
        .is_some_and(|mantissa| mantissa.bytes().any(|b| (b'1'..=b'9').contains(&b)))
}

fn check_encodable(
    text: &str,
    encoding: TextEncoding,
    policy: ErrorPolicy,
) -> Result<(), ConversionFailure> {
    if encoding != TextEncoding::Ascii || policy != ErrorPolicy::Strict {
        return Ok(());
    }
    match text.chars().position(|c| !c.is_ascii()) {
        Some(position) => Err(ConversionFailure::new(
            FailureKind::Encoding,
            text,
            format!("non-ascii character at position {position}"),
        )),
        None => Ok(()),
    }
}

// ===========================================================================
// Dump helpers
// ===========================================================================

fn mismatch(expected: &'static str, found: &Value) -> DumpError {
    DumpError::ValueMismatch {
        expected,
        found: found.kind(),
    }
}

fn dump_integer(value: &Value, width: StorageWidth) -> Result<Vec<u8>, DumpError> {
    let wide: i128 = match value {
        Value::Int(v) => *v as i128,
        Value::UInt(v) => *v as i128,
        other => return Err(mismatch("integer", other)),
    };
    let out_of_range = || DumpError::OutOfRange {
        value: wide.to_string(),
        width,
    };
    let bytes = match width {
        StorageWidth::I8 => i8::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        StorageWidth::I16 => i16::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        StorageWidth::I32 => i32::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        StorageWidth::I64 => i64::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        StorageWidth::U8 => u8::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        StorageWidth::U16 => u16::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        StorageWidth::U32 => u32::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        StorageWidth::U64 => u64::try_from(wide).map_err(|_| out_of_range())?.to_le_bytes().to_vec(),
        _ => return Err(out_of_range()),
    };
    Ok(bytes)
}

fn encode_text(text: &str, encoding: TextEncoding, policy: ErrorPolicy) -> Result<Vec<u8>, DumpError> {
    match encoding {
        TextEncoding::Utf8 => Ok(text.as_bytes().to_vec()),
        TextEncoding::Utf16 => Ok(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        TextEncoding::Ascii => {
            let mut out = Vec::with_capacity(text.len());
            for (position, c) in text.chars().enumerate() {
                if c.is_ascii() {
                    out.push(c as u8);
                    continue;
                }
                match policy {
                    ErrorPolicy::Strict => return Err(DumpError::Encoding { position }),
                    ErrorPolicy::Ignore => {}
                    ErrorPolicy::Replace => out.push(b'?'),
                }
            }
            Ok(out)
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
