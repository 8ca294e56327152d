//! Localization extraction.
//!
//! Columns named `$field[locale]` hold translations of the plain column
//! `field`. [`LocalizationHashTable::extract`] flattens them into
//! `(head, hash, text)` triples keyed by the adler32 of the key text:
//!
//! ```text
//! head            hash             text
//! 0               0                "adler32"      algorithm sentinel
//! 0               adler32("key")   "key"          key head
//! 0               adler32("en")    "en"           locale head
//! adler32("key")  adler32(k)       k              key row
//! adler32("en")   adler32(k)       "Hello"        locale row
//! ```
//!
//! [`LocalizationTextTable::pivot`] regroups those triples into one column
//! per locale for review.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::compact::{is_plain_field, retained_records};
use crate::field_type::TypeError;
use crate::hash::adler32;
use crate::registry::TypeRegistry;
use crate::table::{RawTable, TypedTable};
use crate::value::Value;

/// Name of the hash algorithm recorded in the sentinel row.
pub const HASH_ALGORITHM: &str = "adler32";
/// Head text under which key rows are filed.
pub const KEY_HEAD: &str = "key";

/// Field names of a hash table.
pub const HASH_TABLE_FIELDS: [&str; 3] = ["head", "hash", "text"];
/// Type expressions of a hash table. Unsigned so every adler32 value fits.
pub const HASH_TABLE_TYPES: [&str; 3] = ["uint32", "uint32", "str:utf8"];

static DECORATED_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\$(\w+)\[(\w+)\]$").expect("decorated field pattern is valid")
});

/// Errors raised while extracting or pivoting localization text.
#[derive(Debug, thiserror::Error)]
pub enum LocalizationError {
    #[error("column '{column}' localizes '{field}', but the table has no plain key column")]
    MissingKeyColumn { field: String, column: String },

    #[error("hash {hash:#010x} under head {head:#010x} maps to both '{existing}' and '{incoming}'")]
    HashCollision {
        head: u32,
        hash: u32,
        existing: String,
        incoming: String,
    },

    #[error("row {position}: head {head:#010x} has hash {found:#010x}, expected {expected:#010x}")]
    Alignment {
        position: usize,
        head: u32,
        expected: u32,
        found: u32,
    },

    #[error("head {head:#010x} has {found} rows, expected {expected}")]
    UnevenColumns {
        head: u32,
        expected: usize,
        found: usize,
    },

    #[error(transparent)]
    Type(#[from] TypeError),
}

// ===========================================================================
// Decorated columns
// ===========================================================================

/// A `$field[locale]` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoratedColumn {
    pub index: usize,
    pub field: String,
    pub locale: String,
}

/// Parse a decorated column name into `(field, locale)`.
pub fn parse_decorated(name: &str) -> Option<(&str, &str)> {
    let caps = DECORATED_FIELD.captures(name)?;
    Some((caps.get(1)?.as_str(), caps.get(2)?.as_str()))
}

/// All decorated columns of a table, in column order.
pub fn decorated_columns(field_names: &[String]) -> Vec<DecoratedColumn> {
    field_names
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            parse_decorated(name).map(|(field, locale)| DecoratedColumn {
                index,
                field: field.to_string(),
                locale: locale.to_string(),
            })
        })
        .collect()
}

/// Column holding the key text for `column`: the plain column named after
/// the localized field, or else the table's first plain column (the row id).
fn key_column(raw: &RawTable, column: &DecoratedColumn) -> Result<usize, LocalizationError> {
    raw.column_index(&column.field)
        .or_else(|| raw.field_names().iter().position(|n| is_plain_field(n)))
        .ok_or_else(|| LocalizationError::MissingKeyColumn {
            field: column.field.clone(),
            column: raw.field_names()[column.index].clone(),
        })
}

// ===========================================================================
// Hash table
// ===========================================================================

/// One `(head, hash, text)` triple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashRow {
    pub head: u32,
    pub hash: u32,
    pub text: String,
}

impl HashRow {
    fn new(head: u32, hash: u32, text: impl Into<String>) -> Self {
        Self {
            head,
            hash,
            text: text.into(),
        }
    }
}

/// Localization text keyed by content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizationHashTable {
    rows: Vec<HashRow>,
    locale_count: usize,
}

impl LocalizationHashTable {
    /// Extract every decorated column of `raw` (pre-compaction). Rows are
    /// emitted column by column: all pairs for one decorated column are
    /// contiguous. Comment and blank rows are skipped with the compaction
    /// rule.
    pub fn extract(raw: &RawTable) -> Result<Self, LocalizationError> {
        let key_head = adler32(KEY_HEAD);
        let columns = decorated_columns(raw.field_names());
        let records: Vec<&[String]> = retained_records(raw).collect();

        let mut table = Self {
            rows: Vec::with_capacity(2 + columns.len() * (1 + 2 * records.len())),
            locale_count: 0,
        };
        let mut seen: HashMap<(u32, u32), usize> = HashMap::new();

        table.push(&mut seen, HashRow::new(0, 0, HASH_ALGORITHM))?;
        table.push(&mut seen, HashRow::new(0, key_head, KEY_HEAD))?;

        let mut locales: Vec<&str> = Vec::new();
        for column in &columns {
            let locale_head = adler32(&column.locale);
            table.push(&mut seen, HashRow::new(0, locale_head, column.locale.as_str()))?;
            if !locales.contains(&column.locale.as_str()) {
                locales.push(&column.locale);
            }

            let key_idx = key_column(raw, column)?;

            for record in &records {
                let key_text = &record[key_idx];
                let locale_text = &record[column.index];
                let key_hash = adler32(key_text);
                table.push(&mut seen, HashRow::new(key_head, key_hash, key_text.as_str()))?;
                table.push(
                    &mut seen,
                    HashRow::new(locale_head, key_hash, locale_text.as_str()),
                )?;
            }
        }
        table.locale_count = locales.len();

        tracing::debug!(
            rows = table.rows.len(),
            locales = table.locale_count,
            "extracted localization hash table"
        );
        Ok(table)
    }

    /// Append a row, rejecting a second text under an existing
    /// `(head, hash)` pair. Identical repeats are kept.
    fn push(
        &mut self,
        seen: &mut HashMap<(u32, u32), usize>,
        row: HashRow,
    ) -> Result<(), LocalizationError> {
        if let Some(&first) = seen.get(&(row.head, row.hash)) {
            let existing = &self.rows[first].text;
            if *existing != row.text {
                return Err(LocalizationError::HashCollision {
                    head: row.head,
                    hash: row.hash,
                    existing: existing.clone(),
                    incoming: row.text,
                });
            }
        } else {
            seen.insert((row.head, row.hash), self.rows.len());
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn rows(&self) -> &[HashRow] {
        &self.rows
    }

    /// Number of distinct locales.
    pub fn locale_count(&self) -> usize {
        self.locale_count
    }

    /// True when the source had no decorated columns.
    pub fn is_empty(&self) -> bool {
        self.locale_count == 0
    }

    /// As a typed table `(head: uint32, hash: uint32, text: str:utf8)`,
    /// ready for binary encoding.
    pub fn to_typed(&self, registry: &TypeRegistry) -> Result<TypedTable, LocalizationError> {
        let field_types = registry.resolve_all(&HASH_TABLE_TYPES)?;
        let records = self
            .rows
            .iter()
            .map(|row| {
                vec![
                    Value::UInt(row.head as u64),
                    Value::UInt(row.hash as u64),
                    Value::Text(row.text.clone()),
                ]
            })
            .collect();
        Ok(TypedTable::from_parts(
            HASH_TABLE_FIELDS.iter().map(|s| s.to_string()).collect(),
            field_types,
            records,
        ))
    }
}

// ===========================================================================
// Text table
// ===========================================================================

/// One head's `hash -> text` entries in first-seen order.
#[derive(Debug, Default)]
struct HeadGroup {
    entries: Vec<(u32, String)>,
    index: HashMap<u32, usize>,
}

impl HeadGroup {
    fn insert(&mut self, head: u32, hash: u32, text: &str) -> Result<(), LocalizationError> {
        match self.index.get(&hash) {
            Some(&i) if self.entries[i].1 != text => Err(LocalizationError::HashCollision {
                head,
                hash,
                existing: self.entries[i].1.clone(),
                incoming: text.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.index.insert(hash, self.entries.len());
                self.entries.push((hash, text.to_string()));
                Ok(())
            }
        }
    }
}

/// One pivoted row: the key hash plus the key text and one text per locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRow {
    pub hash: u32,
    pub texts: Vec<String>,
}

/// Localization text with one column per locale, aligned by key hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalizationTextTable {
    header: Vec<String>,
    rows: Vec<TextRow>,
}

impl LocalizationTextTable {
    /// Regroup a hash table by head. The header is the head-0 texts
    /// (`adler32`, `key`, then locales); every other head becomes a column,
    /// zipped positionally. All columns must list the same hashes in the
    /// same order.
    pub fn pivot(hash_table: &LocalizationHashTable) -> Result<Self, LocalizationError> {
        let mut heads: Vec<u32> = Vec::new();
        let mut groups: HashMap<u32, HeadGroup> = HashMap::new();
        for row in &hash_table.rows {
            let group = groups.entry(row.head).or_insert_with(|| {
                heads.push(row.head);
                HeadGroup::default()
            });
            group.insert(row.head, row.hash, &row.text)?;
        }

        let empty = HeadGroup::default();
        let declared = groups.get(&0).unwrap_or(&empty);
        let header: Vec<String> = declared.entries.iter().map(|(_, t)| t.clone()).collect();

        // Head 0 lists the column heads after the algorithm sentinel.
        let columns: Vec<(u32, &HeadGroup)> = declared
            .entries
            .iter()
            .skip(1)
            .map(|(head, _)| (*head, groups.get(head).unwrap_or(&empty)))
            .collect();

        let expected_len = columns.first().map_or(0, |(_, g)| g.entries.len());
        for (head, group) in &columns {
            if group.entries.len() != expected_len {
                return Err(LocalizationError::UnevenColumns {
                    head: *head,
                    expected: expected_len,
                    found: group.entries.len(),
                });
            }
        }

        let mut rows = Vec::with_capacity(expected_len);
        for position in 0..expected_len {
            let hash = columns[0].1.entries[position].0;
            let mut texts = Vec::with_capacity(columns.len());
            for (head, group) in &columns {
                let (found, text) = &group.entries[position];
                if *found != hash {
                    return Err(LocalizationError::Alignment {
                        position,
                        head: *head,
                        expected: hash,
                        found: *found,
                    });
                }
                texts.push(text.clone());
            }
            rows.push(TextRow { hash, texts });
        }

        tracing::debug!(
            rows = rows.len(),
            columns = header.len(),
            heads = heads.len(),
            "pivoted localization text table"
        );
        Ok(Self { header, rows })
    }

    /// Column names: hash algorithm, `key`, then each locale.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    pub fn rows(&self) -> &[TextRow] {
        &self.rows
    }

    /// Type expressions: `uint32` for the hash column, `str` for the rest.
    pub fn type_exprs(&self) -> Vec<String> {
        (0..self.header.len())
            .map(|i| if i == 0 { "uint32" } else { "str" }.to_string())
            .collect()
    }

    pub fn to_typed(&self, registry: &TypeRegistry) -> Result<TypedTable, LocalizationError> {
        let field_types = registry.resolve_all(&self.type_exprs())?;
        let records = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(Value::UInt(row.hash as u64))
                    .chain(row.texts.iter().cloned().map(Value::Text))
                    .collect()
            })
            .collect();
        Ok(TypedTable::from_parts(self.header.clone(), field_types, records))
    }

    /// As a text grid (hash rendered in decimal), e.g. for CSV review files.
    pub fn to_raw(&self) -> RawTable {
        let records = self
            .rows
            .iter()
            .map(|row| {
                std::iter::once(row.hash.to_string())
                    .chain(row.texts.iter().cloned())
                    .collect()
            })
            .collect();
        RawTable::from_parts(self.header.clone(), self.type_exprs(), records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(rows: &[&[&str]]) -> RawTable {
        RawTable::from_rows(rows.iter().map(|r| r.iter().copied())).unwrap()
    }

    fn sample() -> RawTable {
        raw(&[
            &["id", "name", "$name[src]", "desc", "$desc[src]"],
            &["int", "str:fk:string.key", "str:utf8", "str:fk:string.key", "str:utf8"],
            &["1", "NAME_A", "가 이름", "DESC_A", "가 설명"],
            &["2", "NAME_B", "나 이름", "DESC_B", "나 설명"],
        ])
    }

    #[test]
    fn parse_decorated_names() {
        assert_eq!(parse_decorated("$name[en]"), Some(("name", "en")));
        assert_eq!(parse_decorated("name"), None);
        assert_eq!(parse_decorated("$name[en"), None);
        assert_eq!(parse_decorated("$name[en]x"), None);
    }

    #[test]
    fn decorated_columns_in_order() {
        let cols = decorated_columns(sample().field_names());
        assert_eq!(cols.len(), 2);
        assert_eq!(cols[0].index, 2);
        assert_eq!(cols[0].field, "name");
        assert_eq!(cols[1].field, "desc");
        assert_eq!(cols[1].locale, "src");
    }

    #[test]
    fn hash_table_layout() {
        let table = raw(&[
            &["name", "$name[en]"],
            &["str", "str"],
            &["1", "Hello"],
        ]);
        let hashed = LocalizationHashTable::extract(&table).unwrap();
        let key_head = adler32("key");
        let en = adler32("en");
        assert_eq!(
            hashed.rows(),
            [
                HashRow::new(0, 0, "adler32"),
                HashRow::new(0, key_head, "key"),
                HashRow::new(0, en, "en"),
                HashRow::new(key_head, adler32("1"), "1"),
                HashRow::new(en, adler32("1"), "Hello"),
            ]
        );
        assert_eq!(hashed.locale_count(), 1);
    }

    #[test]
    fn key_falls_back_to_first_plain_column() {
        let table = raw(&[&["id", "$name[en]"], &["int", "str"], &["1", "Hello"]]);
        let hashed = LocalizationHashTable::extract(&table).unwrap();
        let key_head = adler32(KEY_HEAD);
        assert!(hashed.rows().contains(&HashRow::new(key_head, adler32("1"), "1")));
        assert!(hashed.rows().contains(&HashRow::new(adler32("en"), adler32("1"), "Hello")));
    }

    #[test]
    fn no_plain_column_is_missing_key() {
        let table = raw(&[&["$name[en]"], &["str"], &["Hello"]]);
        assert!(matches!(
            LocalizationHashTable::extract(&table),
            Err(LocalizationError::MissingKeyColumn { .. })
        ));
    }

    #[test]
    fn columns_are_contiguous() {
        let hashed = LocalizationHashTable::extract(&sample()).unwrap();
        let rows = hashed.rows();
        // 2 sentinels + per column (1 head + 2 rows * 2)
        assert_eq!(rows.len(), 2 + 2 * (1 + 4));
        assert_eq!(rows[3].text, "NAME_A");
        assert_eq!(rows[4].text, "가 이름");
        assert_eq!(rows[5].text, "NAME_B");
        assert_eq!(rows[7].text, "src");
        assert_eq!(rows[8].text, "DESC_A");
    }

    #[test]
    fn no_decorated_columns_yields_sentinels_only() {
        let table = raw(&[&["id"], &["int"], &["1"]]);
        let hashed = LocalizationHashTable::extract(&table).unwrap();
        assert!(hashed.is_empty());
        assert_eq!(hashed.rows().len(), 2);

        let text = LocalizationTextTable::pivot(&hashed).unwrap();
        assert_eq!(text.header(), ["adler32", "key"]);
        assert!(text.rows().is_empty());
    }

    #[test]
    fn comment_rows_are_skipped() {
        let table = raw(&[
            &["name", "$name[en]"],
            &["str", "str"],
            &["#A", "skip"],
            &["B", "keep"],
        ]);
        let hashed = LocalizationHashTable::extract(&table).unwrap();
        assert!(hashed.rows().iter().all(|r| r.text != "skip"));
    }

    #[test]
    fn pivot_regroups_by_locale() {
        let table = raw(&[
            &["name", "$name[en]", "$name[ko]"],
            &["str", "str", "str"],
            &["HELLO", "Hello", "안녕"],
            &["BYE", "Bye", "잘가"],
        ]);
        let hashed = LocalizationHashTable::extract(&table).unwrap();
        let text = LocalizationTextTable::pivot(&hashed).unwrap();
        assert_eq!(text.header(), ["adler32", "key", "en", "ko"]);
        assert_eq!(text.rows().len(), 2);
        assert_eq!(text.rows()[0].hash, adler32("HELLO"));
        assert_eq!(text.rows()[0].texts, ["HELLO", "Hello", "안녕"]);
        assert_eq!(text.rows()[1].texts, ["BYE", "Bye", "잘가"]);
    }

    #[test]
    fn pivot_merges_fields_sharing_a_locale() {
        let hashed = LocalizationHashTable::extract(&sample()).unwrap();
        let text = LocalizationTextTable::pivot(&hashed).unwrap();
        assert_eq!(text.header(), ["adler32", "key", "src"]);
        let keys: Vec<&str> = text.rows().iter().map(|r| r.texts[0].as_str()).collect();
        assert_eq!(keys, ["NAME_A", "NAME_B", "DESC_A", "DESC_B"]);
        assert_eq!(text.rows()[2].texts[1], "가 설명");
    }

    #[test]
    fn conflicting_translation_is_a_collision() {
        let table = raw(&[
            &["name", "$name[en]"],
            &["str", "str"],
            &["HELLO", "Hello"],
            &["HELLO", "Hi"],
        ]);
        assert!(matches!(
            LocalizationHashTable::extract(&table),
            Err(LocalizationError::HashCollision { .. })
        ));
    }

    #[test]
    fn duplicate_identical_rows_are_tolerated() {
        let table = raw(&[
            &["name", "$name[en]"],
            &["str", "str"],
            &["HELLO", "Hello"],
            &["HELLO", "Hello"],
        ]);
        let hashed = LocalizationHashTable::extract(&table).unwrap();
        let text = LocalizationTextTable::pivot(&hashed).unwrap();
        assert_eq!(text.rows().len(), 1);
    }

    #[test]
    fn uneven_columns_are_rejected() {
        // Hand-built hash table where `ko` misses one key.
        let key_head = adler32(KEY_HEAD);
        let (en, ko) = (adler32("en"), adler32("ko"));
        let table = LocalizationHashTable {
            rows: vec![
                HashRow::new(0, 0, HASH_ALGORITHM),
                HashRow::new(0, key_head, KEY_HEAD),
                HashRow::new(0, en, "en"),
                HashRow::new(key_head, 1, "A"),
                HashRow::new(en, 1, "a"),
                HashRow::new(key_head, 2, "B"),
                HashRow::new(en, 2, "b"),
                HashRow::new(0, ko, "ko"),
                HashRow::new(ko, 1, "가"),
            ],
            locale_count: 2,
        };
        assert!(matches!(
            LocalizationTextTable::pivot(&table),
            Err(LocalizationError::UnevenColumns { .. })
        ));
    }

    #[test]
    fn misordered_columns_are_rejected() {
        let key_head = adler32(KEY_HEAD);
        let en = adler32("en");
        let table = LocalizationHashTable {
            rows: vec![
                HashRow::new(0, 0, HASH_ALGORITHM),
                HashRow::new(0, key_head, KEY_HEAD),
                HashRow::new(0, en, "en"),
                HashRow::new(key_head, 1, "A"),
                HashRow::new(key_head, 2, "B"),
                HashRow::new(en, 2, "b"),
                HashRow::new(en, 1, "a"),
            ],
            locale_count: 1,
        };
        assert!(matches!(
            LocalizationTextTable::pivot(&table),
            Err(LocalizationError::Alignment { position: 0, .. })
        ));
    }

    #[test]
    fn typed_views() {
        let registry = TypeRegistry::builtin();
        let hashed = LocalizationHashTable::extract(&sample()).unwrap();
        let typed = hashed.to_typed(&registry).unwrap();
        assert_eq!(typed.field_names(), ["head", "hash", "text"]);
        assert_eq!(typed.row_count(), hashed.rows().len());
        assert_eq!(typed.records()[0][2], Value::Text("adler32".into()));

        let text = LocalizationTextTable::pivot(&hashed).unwrap();
        let typed = text.to_typed(&registry).unwrap();
        assert_eq!(typed.field_types()[0].expr(), "uint32");
        assert_eq!(typed.records()[0][0], Value::UInt(adler32("NAME_A") as u64));

        let grid = text.to_raw();
        assert_eq!(grid.field_types(), ["uint32", "str", "str"]);
        assert_eq!(grid.records()[0][0], adler32("NAME_A").to_string());
    }

    #[test]
    fn extraction_is_stable() {
        let a = LocalizationHashTable::extract(&sample()).unwrap();
        let b = LocalizationHashTable::extract(&sample()).unwrap();
        assert_eq!(a, b);
    }
}
