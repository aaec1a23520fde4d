//! Field coercion
//!
//! Applies one raw value to model storage: default substitution for empty
//! input, type checking and conversion, object hydration and limit checks.
//! The required-fields sweep runs separately so bulk construction can check
//! once after every field has been applied.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::declaration::FieldType;
use crate::error::{ModelError, Result};
use crate::schema::{FieldDescriptor, ObjectBinding, Schema};
use crate::storage::Storage;
use crate::value::{is_present, FieldInput, FieldValue};

/// Optional sign, no leading zeros
static INTEGER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?(0|[1-9][0-9]*)$").unwrap());

/// Decimal or exponent notation, surrounding whitespace allowed
static NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t\n\r\x0B\x0C]*[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?[ \t\n\r\x0B\x0C]*$")
        .unwrap()
});

/// Apply `raw` to the field `key`
///
/// An empty `raw` (per the type-aware emptiness rule) is replaced by the
/// field's default when that default is itself present; otherwise the field
/// is left as it was. Storage is only touched once coercion succeeded.
pub fn set_field(schema: &Schema, storage: &mut Storage, key: &str, raw: FieldInput) -> Result<()> {
    let (position, descriptor) = schema.lookup(key).ok_or_else(|| ModelError::UnknownField {
        field: key.to_string(),
    })?;

    let value = if raw.is_present(Some(&descriptor.field_type)) {
        Some(raw)
    } else {
        default_value(descriptor)
    };

    match value {
        Some(value) => {
            let coerced = coerce(key, descriptor, value)?;
            trace!(class = schema.class(), field = key, value = ?coerced, "stored field");
            storage.insert(position, key, coerced);
        }
        None => trace!(class = schema.class(), field = key, "field left unset"),
    }

    Ok(())
}

/// Fail with the first required field that is missing or empty in `storage`
pub fn check_required(schema: &Schema, storage: &Storage) -> Result<()> {
    for (key, descriptor) in schema.required_fields() {
        let present = storage
            .get(key)
            .is_some_and(|value| value.is_present(&descriptor.field_type));
        if !present {
            return Err(ModelError::RequiredFieldMissing {
                field: key.to_string(),
            });
        }
    }
    Ok(())
}

fn default_value(descriptor: &FieldDescriptor) -> Option<FieldInput> {
    descriptor
        .default
        .as_ref()
        .filter(|default| is_present(default, Some(&descriptor.field_type)))
        .map(|default| FieldInput::Value(default.clone()))
}

/// Check and convert a present value to the field's declared type
pub fn coerce(key: &str, descriptor: &FieldDescriptor, input: FieldInput) -> Result<FieldValue> {
    if let FieldType::Object = descriptor.field_type {
        return match &descriptor.object {
            Some(binding) => hydrate(key, binding, input),
            None => Err(ModelError::invalid_type(key, &input)),
        };
    }

    let value = match &input {
        FieldInput::Value(value) => value,
        FieldInput::Object(_) => return Err(ModelError::invalid_type(key, &input)),
    };

    let coerced = match &descriptor.field_type {
        FieldType::Int => to_int(value).map(FieldValue::Int),
        FieldType::Numeric => to_numeric(value).map(FieldValue::Numeric),
        FieldType::String => value.as_str().map(|s| FieldValue::String(s.to_string())),
        FieldType::Bool => value.as_bool().map(FieldValue::Bool),
        FieldType::Array => match value {
            Value::Array(_) | Value::Object(_) => Some(FieldValue::Array(value.clone())),
            _ => None,
        },
        FieldType::Object => None,
        FieldType::Other(type_name) => {
            return Err(ModelError::UnsupportedType {
                field: key.to_string(),
                type_name: type_name.clone(),
            })
        }
    };

    let coerced = coerced.ok_or_else(|| ModelError::invalid_type(key, value))?;

    if let Some(limits) = &descriptor.limits {
        if let Some(number) = coerced.as_f64() {
            if !limits.contains(number) {
                return Err(ModelError::OutOfRange {
                    field: key.to_string(),
                    value: number,
                    min: limits.min,
                    max: limits.max,
                });
            }
        }
    }

    Ok(coerced)
}

fn hydrate(key: &str, binding: &ObjectBinding, input: FieldInput) -> Result<FieldValue> {
    if let FieldInput::Object(object) = &input {
        if object.class_name() == binding.class {
            return Ok(FieldValue::Object(Arc::clone(object)));
        }
    }

    let Some((function, factory)) = &binding.initial_function else {
        return Err(ModelError::invalid_type(key, &input));
    };

    debug!(field = key, class = %binding.class, function = %function, "hydrating object");
    let object = factory(&input.to_value())?;
    if object.class_name() != binding.class {
        return Err(ModelError::invalid_type(key, &input));
    }

    Ok(FieldValue::Object(object))
}

/// Strict integer check: JSON integers, integral floats, or integer strings
fn to_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                .map(|f| f as i64)
        }),
        Value::String(s) => {
            let trimmed = s.trim_matches(|c: char| c.is_ascii_whitespace() || c == '\x0B');
            INTEGER
                .is_match(trimmed)
                .then(|| trimmed.parse::<i64>().ok())
                .flatten()
        }
        _ => None,
    }
}

/// Numeric check: JSON numbers or numeric strings, finite only
fn to_numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if NUMERIC.is_match(s) => s
            .trim_matches(|c: char| c.is_ascii_whitespace() || c == '\x0B')
            .parse::<f64>()
            .ok(),
        _ => None,
    };
    number.filter(|n| n.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{FieldDeclaration, SchemaDeclaration};
    use crate::registry::ClassRegistry;
    use serde_json::json;

    fn schema(declaration: SchemaDeclaration) -> Schema {
        Schema::compile("Test", &declaration, &ClassRegistry::new()).unwrap()
    }

    fn coerce_one(declaration: FieldDeclaration, raw: Value) -> Result<Option<FieldValue>> {
        let schema = schema(SchemaDeclaration::new().field("x", declaration));
        let mut storage = Storage::new();
        set_field(&schema, &mut storage, "x", raw.into())?;
        Ok(storage.get("x").cloned())
    }

    #[test]
    fn test_int_coercion() {
        assert_eq!(coerce_one(FieldDeclaration::int(), json!(42)).unwrap(), Some(FieldValue::Int(42)));
        assert_eq!(coerce_one(FieldDeclaration::int(), json!("-17")).unwrap(), Some(FieldValue::Int(-17)));
        assert_eq!(coerce_one(FieldDeclaration::int(), json!(" 8 ")).unwrap(), Some(FieldValue::Int(8)));
        assert_eq!(coerce_one(FieldDeclaration::int(), json!(3.0)).unwrap(), Some(FieldValue::Int(3)));
        assert_eq!(coerce_one(FieldDeclaration::int(), json!(0)).unwrap(), Some(FieldValue::Int(0)));
        assert_eq!(coerce_one(FieldDeclaration::int(), json!("0")).unwrap(), Some(FieldValue::Int(0)));

        for bad in [json!("007"), json!("1.5"), json!(1.5), json!("abc"), json!(true), json!([1])] {
            assert!(
                matches!(coerce_one(FieldDeclaration::int(), bad.clone()), Err(ModelError::InvalidType { .. })),
                "{bad} should not coerce to int"
            );
        }
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(coerce_one(FieldDeclaration::numeric(), json!(2)).unwrap(), Some(FieldValue::Numeric(2.0)));
        assert_eq!(coerce_one(FieldDeclaration::numeric(), json!("1.5e3")).unwrap(), Some(FieldValue::Numeric(1500.0)));
        assert_eq!(coerce_one(FieldDeclaration::numeric(), json!(" .5")).unwrap(), Some(FieldValue::Numeric(0.5)));
        assert_eq!(coerce_one(FieldDeclaration::numeric(), json!(0.0)).unwrap(), Some(FieldValue::Numeric(0.0)));

        for bad in [json!("1,5"), json!("1e"), json!("inf"), json!("1e400")] {
            assert!(
                matches!(coerce_one(FieldDeclaration::numeric(), bad.clone()), Err(ModelError::InvalidType { .. })),
                "{bad} should not coerce to numeric"
            );
        }

        // false is empty for a numeric field, so it is left unset
        assert_eq!(coerce_one(FieldDeclaration::numeric(), json!(false)).unwrap(), None);
    }

    #[test]
    fn test_string_bool_array_are_not_converted() {
        assert_eq!(
            coerce_one(FieldDeclaration::string(), json!("x")).unwrap(),
            Some(FieldValue::String("x".to_string()))
        );
        assert!(coerce_one(FieldDeclaration::string(), json!(5)).is_err());

        assert_eq!(coerce_one(FieldDeclaration::bool(), json!(false)).unwrap(), Some(FieldValue::Bool(false)));
        assert!(coerce_one(FieldDeclaration::bool(), json!(1)).is_err());
        assert!(coerce_one(FieldDeclaration::bool(), json!("true")).is_err());

        assert_eq!(
            coerce_one(FieldDeclaration::array(), json!({"k": 1})).unwrap(),
            Some(FieldValue::Array(json!({"k": 1})))
        );
        assert!(coerce_one(FieldDeclaration::array(), json!("list")).is_err());
    }

    #[test]
    fn test_empty_values_for_other_types_leave_field_unset() {
        // zero is empty for a string field, so it is neither stored nor rejected
        assert_eq!(coerce_one(FieldDeclaration::string(), json!(0)).unwrap(), None);
        assert_eq!(coerce_one(FieldDeclaration::array(), json!(false)).unwrap(), None);
        assert_eq!(coerce_one(FieldDeclaration::int(), json!(false)).unwrap(), None);
        assert_eq!(coerce_one(FieldDeclaration::int(), json!(null)).unwrap(), None);
    }

    #[test]
    fn test_default_substitution() {
        let n = || FieldDeclaration::int().default_value(5);
        assert_eq!(coerce_one(n(), json!(null)).unwrap(), Some(FieldValue::Int(5)));
        assert_eq!(coerce_one(n(), json!("")).unwrap(), Some(FieldValue::Int(5)));
        assert_eq!(coerce_one(n(), json!(0)).unwrap(), Some(FieldValue::Int(0)));

        // an empty default is no default
        let s = FieldDeclaration::string().default_value("");
        assert_eq!(coerce_one(s, json!(null)).unwrap(), None);

        // defaults go through the same type check
        let bad = FieldDeclaration::int().default_value("five");
        assert!(matches!(coerce_one(bad, json!(null)), Err(ModelError::InvalidType { .. })));
    }

    #[test]
    fn test_limits() {
        let age = || FieldDeclaration::int().limits(Some(0.0), Some(150.0));
        assert_eq!(coerce_one(age(), json!(150)).unwrap(), Some(FieldValue::Int(150)));
        match coerce_one(age(), json!(151)) {
            Err(ModelError::OutOfRange { field, value, .. }) => {
                assert_eq!(field, "x");
                assert_eq!(value, 151.0);
            }
            other => panic!("Expected OutOfRange, got {:?}", other),
        }
        assert!(coerce_one(FieldDeclaration::numeric().limits(None, Some(1.0)), json!("1.01")).is_err());
    }

    #[test]
    fn test_unsupported_type() {
        match coerce_one(FieldDeclaration::new("date"), json!("2024-01-01")) {
            Err(ModelError::UnsupportedType { field, type_name }) => {
                assert_eq!(field, "x");
                assert_eq!(type_name, "date");
            }
            other => panic!("Expected UnsupportedType, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_field() {
        let schema = schema(SchemaDeclaration::new().field("a", FieldDeclaration::string()));
        let mut storage = Storage::new();
        match set_field(&schema, &mut storage, "b", "y".into()) {
            Err(ModelError::UnknownField { field }) => assert_eq!(field, "b"),
            other => panic!("Expected UnknownField, got {:?}", other),
        }
        assert!(storage.is_empty());
    }

    #[test]
    fn test_failed_coercion_keeps_previous_value() {
        let schema = schema(SchemaDeclaration::new().field("a", FieldDeclaration::int()));
        let mut storage = Storage::new();
        set_field(&schema, &mut storage, "a", 1.into()).unwrap();
        assert!(set_field(&schema, &mut storage, "a", "one".into()).is_err());
        set_field(&schema, &mut storage, "a", Value::Null.into()).unwrap();
        assert_eq!(storage.get("a"), Some(&FieldValue::Int(1)));
    }

    #[test]
    fn test_check_required() {
        let schema = schema(
            SchemaDeclaration::new()
                .field("id", FieldDeclaration::int().required(true))
                .field("active", FieldDeclaration::bool().required(true)),
        );
        let mut storage = Storage::new();
        match check_required(&schema, &storage) {
            Err(ModelError::RequiredFieldMissing { field }) => assert_eq!(field, "id"),
            other => panic!("Expected RequiredFieldMissing, got {:?}", other),
        }

        set_field(&schema, &mut storage, "id", 0.into()).unwrap();
        set_field(&schema, &mut storage, "active", false.into()).unwrap();
        assert!(check_required(&schema, &storage).is_ok());
    }
}
