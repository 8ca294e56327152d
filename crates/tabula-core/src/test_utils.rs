//! Helpers for building tables in tests.

use std::collections::HashSet;

use crate::hash::adler32;
use crate::table::RawTable;

/// Build a raw table from string literals. Panics on malformed input.
pub fn raw_table(rows: &[&[&str]]) -> RawTable {
    RawTable::from_rows(rows.iter().map(|r| r.iter().copied())).expect("well-formed test table")
}

/// A small item table with typed columns, a comment row and a memo column.
pub fn item_table() -> RawTable {
    raw_table(&[
        &["id", "name", "price", "weight", "released", "#memo"],
        &["int:pk", "str:key", "uint16", "real", "date", "str"],
        &["1", "SWORD", "120", "3.5", "2024-01-15", "starter"],
        &["# retired items", "", "", "", "", ""],
        &["2", "SHIELD", "80", "6.25", "2024-02-01", ""],
        &["3", "POTION", "15", "0.5", "2024-03-10", "consumable"],
    ])
}

/// An item table whose `name` column is translated to `en` and `ko`.
pub fn localized_item_table() -> RawTable {
    raw_table(&[
        &["id", "name", "$name[en]", "$name[ko]"],
        &["int:pk", "str:key", "str", "str"],
        &["1", "ITEM_SWORD", "Sword", "검"],
        &["#2", "ITEM_OLD", "Old", "낡은"],
        &["3", "ITEM_SHIELD", "Shield", "방패"],
    ])
}

/// `count` distinct key texts whose adler32 values are also distinct.
/// Short decimal suffixes collide under adler32, so colliding candidates
/// are skipped.
pub fn distinct_keys(prefix: &str, count: usize) -> Vec<String> {
    let mut seen = HashSet::with_capacity(count);
    (0..)
        .map(|i| format!("{prefix}{i}"))
        .filter(|key| seen.insert(adler32(key)))
        .take(count)
        .collect()
}

/// A synthetic localized table of `rows` records for benchmarks.
pub fn wide_table(rows: usize) -> RawTable {
    let header = ["id", "code", "name", "$name[en]", "score", "hash"];
    let types = ["int:pk", "int:hex", "str:key", "str", "real64", "str:sha1"];
    let mut grid: Vec<Vec<String>> = vec![
        header.iter().map(|s| s.to_string()).collect(),
        types.iter().map(|s| s.to_string()).collect(),
    ];
    for (i, key) in distinct_keys("NAME_", rows).into_iter().enumerate() {
        grid.push(vec![
            i.to_string(),
            format!("{i:X}"),
            key,
            format!("Name {i}"),
            format!("{}.25", i % 1000),
            format!("row-{i}"),
        ]);
    }
    RawTable::from_rows(grid).expect("well-formed test table")
}
