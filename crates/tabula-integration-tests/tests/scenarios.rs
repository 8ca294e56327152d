//! End-to-end scenarios through the public API of `tabula-core`.
//!
//! Each test drives a source grid through the same stages a project build
//! uses and checks the observable output of one stage.

use md5::{Digest, Md5};
use sha2::Sha256;

use tabula_core::binary::BinaryTable;
use tabula_core::compact::compact;
use tabula_core::field_type::{FailureKind, TypeError};
use tabula_core::hash::adler32;
use tabula_core::localization::{
    HashRow, KEY_HEAD, LocalizationError, LocalizationHashTable, LocalizationTextTable,
};
use tabula_core::test_utils::{item_table, raw_table};
use tabula_core::value::Value;
use tabula_core::{
    CompileError, TableError, TypeRegistry, TypeRegistryBuilder, TypedTable, compile,
};

#[test]
fn int_pk_and_str_encode_to_le_int_and_utf8() {
    let raw = raw_table(&[&["id", "name"], &["int:pk", "str"], &["1", "Alice"]]);
    let registry = TypeRegistry::builtin();

    let typed = TypedTable::convert(&compact(&raw), &registry).unwrap();
    assert_eq!(
        typed.records()[0],
        [Value::Int(1), Value::Text("Alice".into())]
    );

    let binary = BinaryTable::encode(&typed).unwrap();
    let mut flat = binary.records[0][0].clone();
    flat.extend_from_slice(&binary.records[0][1]);
    assert_eq!(flat, b"\x01\x00\x00\x00Alice");
}

#[test]
fn hex_modifier_parses_base_16() {
    let t = TypeRegistry::builtin().resolve("int:hex").unwrap();
    assert_eq!(t.convert("1A").unwrap(), Value::Int(26));
}

#[test]
fn decorated_column_emits_key_and_locale_rows() {
    let raw = raw_table(&[&["id", "$name[en]"], &["int", "str"], &["1", "Hello"]]);
    let hashed = LocalizationHashTable::extract(&raw).unwrap();
    let key_head = adler32(KEY_HEAD);

    let rows = hashed.rows();
    let key_row = HashRow {
        head: key_head,
        hash: adler32("1"),
        text: "1".into(),
    };
    let locale_row = HashRow {
        head: adler32("en"),
        hash: adler32("1"),
        text: "Hello".into(),
    };
    let key_pos = rows.iter().position(|r| *r == key_row).unwrap();
    assert_eq!(rows[key_pos + 1], locale_row);
}

#[test]
fn comment_row_never_reaches_typed_table() {
    let raw = raw_table(&[
        &["id", "name"],
        &["int", "str"],
        &["#comment", "not a number either"],
        &["2", "kept"],
    ]);
    // Without compaction the comment row would fail integer conversion.
    let compiled = compile("t", &raw, &TypeRegistry::builtin()).unwrap();
    assert_eq!(compiled.typed.row_count(), 1);
    assert_eq!(compiled.typed.records()[0][0], Value::Int(2));
}

#[test]
fn bogus_type_is_unknown_data_type() {
    let err = TypeRegistry::builtin().resolve("bogus_type").unwrap_err();
    match err {
        TypeError::UnknownDataType { expr } => assert_eq!(expr, "bogus_type"),
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn str_md5_dumps_the_digest() {
    let t = TypeRegistry::builtin().resolve("str:md5").unwrap();
    let value = t.convert("Hello:MD5").unwrap();
    let bytes = t.dump(&value).unwrap();
    assert_eq!(bytes.len(), 16);
    assert_eq!(bytes, Md5::digest("Hello:MD5".as_bytes()).to_vec());
}

// ---------------------------------------------------------------------------
// Beyond the basic scenarios
// ---------------------------------------------------------------------------

#[test]
fn str_pk_sha256_stores_the_digest() {
    let t = TypeRegistry::builtin().resolve("str:pk:sha256").unwrap();
    let bytes = t.dump(&t.convert("SWORD").unwrap()).unwrap();
    assert_eq!(bytes, Sha256::digest(b"SWORD").to_vec());
}

#[test]
fn item_table_compiles_end_to_end() {
    let compiled = compile("item", &item_table(), &TypeRegistry::builtin()).unwrap();
    assert_eq!(
        compiled.typed.field_names(),
        ["id", "name", "price", "weight", "released"]
    );
    assert_eq!(compiled.typed.row_count(), 3);
    // uint16 price, f32 weight
    assert_eq!(compiled.binary.records[1][2], 80u16.to_le_bytes());
    assert_eq!(compiled.binary.records[1][3], 6.25f32.to_le_bytes());
    assert_eq!(compiled.binary.records[2][4], b"2024-03-10");
}

#[test]
fn enum_namespace_from_registry() {
    let mut builder = TypeRegistryBuilder::new();
    builder
        .register_enum("grade", [("COMMON", 0), ("RARE", 1)])
        .unwrap();
    let registry = builder.build();

    let raw = raw_table(&[&["id", "grade"], &["int", "enum:grade"], &["1", "RARE"]]);
    let compiled = compile("item", &raw, &registry).unwrap();
    assert_eq!(compiled.binary.records[0][1], 1i32.to_le_bytes());

    let raw = raw_table(&[&["id", "grade"], &["int", "enum:grade"], &["1", "EPIC"]]);
    let err = compile("item", &raw, &registry).unwrap_err();
    assert!(err.to_string().contains("EPIC"));
}

#[test]
fn conversion_failure_carries_kind_row_and_column() {
    let raw = raw_table(&[
        &["#note", "id", "when"],
        &["str", "int", "date"],
        &["", "1", "2024-01-01"],
        &["", "# skipped", ""],
        &["", "2", "2024-13-01"],
    ]);
    match compile("events", &raw, &TypeRegistry::builtin()).unwrap_err() {
        CompileError::Table {
            source: TableError::FieldConversion { kind, row, col, .. },
            ..
        } => {
            assert_eq!(kind, FailureKind::InvalidDate);
            // Data row and column of the source grid, not the compacted one.
            assert_eq!((row, col), (2, 2));
        }
        other => panic!("unexpected error {other:?}"),
    }

    // Converting an already compacted table reports compacted offsets.
    let compacted = compact(&raw);
    assert!(matches!(
        TypedTable::convert(&compacted, &TypeRegistry::builtin()),
        Err(TableError::FieldConversion { row: 1, col: 1, .. })
    ));
}

#[test]
fn localization_round_trips_through_pivot() {
    let raw = raw_table(&[
        &["id", "name", "$name[en]", "$name[ja]", "desc", "$desc[en]", "$desc[ja]"],
        &["int", "str:key", "str", "str", "str:key", "str", "str"],
        &["1", "NAME_A", "Sword", "剣", "DESC_A", "Sharp", "鋭い"],
        &["2", "NAME_B", "Shield", "盾", "DESC_B", "Sturdy", "頑丈"],
    ]);
    let hashed = LocalizationHashTable::extract(&raw).unwrap();
    let text = LocalizationTextTable::pivot(&hashed).unwrap();
    assert_eq!(text.header(), ["adler32", "key", "en", "ja"]);
    assert_eq!(hashed.locale_count(), 2);

    let rows: Vec<Vec<&str>> = text
        .rows()
        .iter()
        .map(|r| r.texts.iter().map(String::as_str).collect())
        .collect();
    assert_eq!(
        rows,
        [
            ["NAME_A", "Sword", "剣"],
            ["NAME_B", "Shield", "盾"],
            ["DESC_A", "Sharp", "鋭い"],
            ["DESC_B", "Sturdy", "頑丈"],
        ]
    );
    for row in text.rows() {
        assert_eq!(row.hash, adler32(&row.texts[0]));
    }
}

#[test]
fn partially_translated_locale_cannot_be_pivoted() {
    let raw = raw_table(&[
        &["name", "$name[en]", "desc", "$desc[en]", "$desc[ja]"],
        &["str:key", "str", "str:key", "str", "str"],
        &["NAME_A", "Sword", "DESC_A", "Sharp", "鋭い"],
    ]);
    let hashed = LocalizationHashTable::extract(&raw).unwrap();
    assert!(matches!(
        LocalizationTextTable::pivot(&hashed),
        Err(LocalizationError::UnevenColumns { .. })
    ));
}
