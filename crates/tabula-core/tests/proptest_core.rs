//! Property-based tests for the Tabula compilation pipeline.
//!
//! Uses proptest to generate type expressions, grids and cell text, then
//! verify determinism, round trips and localization consistency.

use proptest::prelude::*;
use tabula_core::binary::BinaryTable;
use tabula_core::compact::compact;
use tabula_core::hash::adler32;
use tabula_core::localization::{LocalizationHashTable, LocalizationTextTable};
use tabula_core::value::Value;
use tabula_core::{RawTable, TypeRegistry, TypedTable, compile};

// ===========================================================================
// Generators
// ===========================================================================

const EXPRESSIONS: &[&str] = &[
    "int", "int8", "int16", "int64", "uint", "uint8", "uint64", "int:hex", "int:bin",
    "int:36", "int:pk", "int:fk:Item.id", "str", "str:key", "str:pk", "str:pk:md5",
    "str:fk:Item.name", "str:md5", "str:sha1", "str:sha256", "str:hash64", "str:hash32",
    "str:utf16", "str:ascii:replace", "real", "real64", "date", "datetime", "time", "json",
    "adler32", "crc32", "md5",
];

fn arb_expression() -> impl Strategy<Value = &'static str> {
    proptest::sample::select(EXPRESSIONS)
}

/// Column names: mostly plain, some decorated or marked.
fn arb_field_name() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z]{1,6}",
        1 => "[a-z]{1,4}".prop_map(|f| format!("${f}[en]")),
        1 => "[a-z]{1,4}".prop_map(|f| format!("#{f}")),
    ]
}

/// First cells: plain values, comments and blanks.
fn arb_cell() -> impl Strategy<Value = String> {
    prop_oneof![
        4 => "[a-z0-9]{1,5}",
        1 => "#[a-z]{0,4}",
        1 => Just(String::new()),
        1 => Just("  ".to_string()),
    ]
}

fn arb_raw_table() -> impl Strategy<Value = RawTable> {
    (1..6usize, 0..12usize).prop_flat_map(|(cols, rows)| {
        (
            proptest::collection::vec(arb_field_name(), cols),
            proptest::collection::vec(proptest::collection::vec(arb_cell(), cols), rows),
        )
            .prop_map(move |(names, records)| {
                let types = vec!["str".to_string(); cols];
                let mut grid = vec![names, types];
                grid.extend(records);
                RawTable::from_rows(grid).unwrap()
            })
    })
}

/// A localized table with distinct keys `K00..` and random translations.
fn arb_localized_table() -> impl Strategy<Value = RawTable> {
    proptest::collection::vec(("[A-Za-z ]{0,12}", "[A-Za-z ]{0,12}"), 0..40).prop_map(|texts| {
        let mut grid = vec![
            vec!["name".to_string(), "$name[en]".to_string(), "$name[fr]".to_string()],
            vec!["str:key".to_string(), "str".to_string(), "str".to_string()],
        ];
        for (i, (en, fr)) in texts.into_iter().enumerate() {
            grid.push(vec![format!("K{i:02}"), en, fr]);
        }
        RawTable::from_rows(grid).unwrap()
    })
}

fn convert_one(expr: &str, text: &str) -> (Value, Vec<u8>) {
    let registry = TypeRegistry::builtin();
    let raw = RawTable::from_rows([vec!["v"], vec![expr], vec![text]]).unwrap();
    let typed = TypedTable::convert(&raw, &registry).unwrap();
    let binary = BinaryTable::encode(&typed).unwrap();
    (typed.records()[0][0].clone(), binary.records[0][0].clone())
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Resolving the same expression twice yields equal field types.
    #[test]
    fn resolve_is_deterministic(expr in arb_expression()) {
        let registry = TypeRegistry::builtin();
        let a = registry.resolve(expr).unwrap();
        let b = registry.resolve(expr).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.to_string(), expr);
    }

    /// compact(compact(t)) == compact(t)
    #[test]
    fn compaction_is_idempotent(table in arb_raw_table()) {
        let once = compact(&table);
        let twice = compact(&once);
        prop_assert_eq!(once, twice);
    }

    /// Compaction never keeps a decorated column or a comment row.
    #[test]
    fn compaction_output_is_clean(table in arb_raw_table()) {
        let compacted = compact(&table);
        for name in compacted.field_names() {
            prop_assert!(!name.starts_with('$') && !name.starts_with('#'));
        }
        for record in compacted.records() {
            let first = &record[0];
            prop_assert!(!first.trim().is_empty() && !first.starts_with('#'));
        }
    }

    /// Compiling the same table twice produces identical bytes.
    #[test]
    fn compile_is_deterministic(table in arb_localized_table()) {
        let registry = TypeRegistry::builtin();
        let a = compile("t", &table, &registry).unwrap();
        let b = compile("t", &table, &registry).unwrap();
        prop_assert_eq!(&a.binary, &b.binary);
        let (la, lb) = (a.localization.map(|l| l.binary), b.localization.map(|l| l.binary));
        prop_assert_eq!(la, lb);
    }

    #[test]
    fn int32_round_trip(n in any::<i32>()) {
        let (value, bytes) = convert_one("int", &n.to_string());
        prop_assert_eq!(value, Value::Int(n as i64));
        prop_assert_eq!(i32::from_le_bytes(bytes.try_into().unwrap()), n);
    }

    #[test]
    fn uint64_hex_round_trip(n in any::<u64>()) {
        let (value, bytes) = convert_one("uint64:hex", &format!("{n:x}"));
        prop_assert_eq!(value, Value::UInt(n));
        prop_assert_eq!(u64::from_le_bytes(bytes.try_into().unwrap()), n);
    }

    #[test]
    fn real64_round_trip(x in proptest::num::f64::NORMAL) {
        let (value, bytes) = convert_one("real64", &x.to_string());
        prop_assert_eq!(value, Value::Real(x));
        prop_assert_eq!(f64::from_le_bytes(bytes.try_into().unwrap()), x);
    }

    #[test]
    fn utf8_round_trip(s in "\\PC{0,24}") {
        let (value, bytes) = convert_one("str", &s);
        prop_assert_eq!(value, Value::Text(s.clone()));
        prop_assert_eq!(String::from_utf8(bytes).unwrap(), s);
    }

    /// Every pivoted row's hash is the adler32 of its key, and each locale
    /// cell is the text that row carried in the source.
    #[test]
    fn localization_is_inverse_consistent(table in arb_localized_table()) {
        let hashed = LocalizationHashTable::extract(&table).unwrap();
        let text = LocalizationTextTable::pivot(&hashed).unwrap();
        prop_assert_eq!(text.rows().len(), table.row_count());
        for (row, source) in text.rows().iter().zip(table.records()) {
            prop_assert_eq!(row.hash, adler32(&source[0]));
            prop_assert_eq!(&row.texts[0], &source[0]);
            prop_assert_eq!(&row.texts[1], &source[1]);
            prop_assert_eq!(&row.texts[2], &source[2]);
        }
    }

    #[test]
    fn localization_is_stable(table in arb_localized_table()) {
        let a = LocalizationHashTable::extract(&table).unwrap();
        let b = LocalizationHashTable::extract(&table.clone()).unwrap();
        prop_assert_eq!(a, b);
    }
}
