//! Structured-text column types.
//!
//! `ron` and `toml` columns hold a RON or TOML document per cell. Both
//! convert to [`Value::Json`] and dump as compact JSON, so the runtime reads
//! one format regardless of what the designers typed.

use tabula_core::field_type::{ConversionFailure, FailureKind, SemanticType, StorageWidth};
use tabula_core::registry::{RegistryError, TypeRegistryBuilder};
use tabula_core::value::Value;

use crate::manifest::DataFormat;

fn convert_ron(text: &str) -> Result<Value, ConversionFailure> {
    ron::from_str::<serde_json::Value>(text)
        .map(Value::Json)
        .map_err(|e| ConversionFailure::new(FailureKind::Custom, text, format!("ron: {e}")))
}

fn convert_toml(text: &str) -> Result<Value, ConversionFailure> {
    toml::from_str::<serde_json::Value>(text)
        .map(Value::Json)
        .map_err(|e| ConversionFailure::new(FailureKind::Custom, text, format!("toml: {e}")))
}

/// Register the column type for `format`.
pub fn register_format(
    builder: &mut TypeRegistryBuilder,
    format: DataFormat,
) -> Result<(), RegistryError> {
    let name = format.type_name();
    match format {
        DataFormat::Ron => builder.register(
            name,
            SemanticType::Json,
            StorageWidth::Variable,
            |text, _, _| convert_ron(text),
        ),
        DataFormat::Toml => builder.register(
            name,
            SemanticType::Json,
            StorageWidth::Variable,
            |text, _, _| convert_toml(text),
        ),
    }
}

/// Register every listed format once; repeats in `formats` are ignored.
pub fn register_formats(
    builder: &mut TypeRegistryBuilder,
    formats: &[DataFormat],
) -> Result<(), RegistryError> {
    let mut done: Vec<DataFormat> = Vec::with_capacity(formats.len());
    for &format in formats {
        if done.contains(&format) {
            continue;
        }
        register_format(builder, format)?;
        done.push(format);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> tabula_core::TypeRegistry {
        let mut builder = TypeRegistryBuilder::new();
        register_formats(&mut builder, &[DataFormat::Ron, DataFormat::Toml, DataFormat::Ron])
            .unwrap();
        builder.build()
    }

    #[test]
    fn ron_cells_become_json() {
        let t = registry().resolve("ron").unwrap();
        assert_eq!(
            t.convert(r#"{"hp": 10, "tags": ["a", "b"]}"#).unwrap(),
            Value::Json(json!({"hp": 10, "tags": ["a", "b"]}))
        );
        assert_eq!(t.convert("[1, 2]").unwrap(), Value::Json(json!([1, 2])));
    }

    #[test]
    fn toml_cells_become_json() {
        let t = registry().resolve("toml").unwrap();
        let value = t.convert("hp = 10\nname = \"slime\"").unwrap();
        assert_eq!(value, Value::Json(json!({"hp": 10, "name": "slime"})));
        assert_eq!(t.dump(&value).unwrap(), br#"{"hp":10,"name":"slime"}"#.to_vec());
    }

    #[test]
    fn malformed_cells_are_custom_failures() {
        let registry = registry();
        let err = registry.resolve("ron").unwrap().convert("{").unwrap_err();
        assert_eq!(err.kind, FailureKind::Custom);
        assert!(err.memo.starts_with("ron:"));

        let err = registry.resolve("toml").unwrap().convert("= 1").unwrap_err();
        assert_eq!(err.kind, FailureKind::Custom);
    }

    #[test]
    fn registering_twice_across_calls_fails() {
        let mut builder = TypeRegistryBuilder::new();
        register_format(&mut builder, DataFormat::Ron).unwrap();
        assert!(matches!(
            register_format(&mut builder, DataFormat::Ron),
            Err(RegistryError::Duplicate(_))
        ));
    }
}
