//! Field values before and after coercion, and the emptiness rule

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::declaration::FieldType;
use crate::model::ModelObject;

/// Raw value handed to a model for one field
#[derive(Clone)]
pub enum FieldInput {
    /// Untyped data (decoded JSON or built with `json!`)
    Value(Value),
    /// An already hydrated object
    Object(Arc<dyn ModelObject>),
}

impl FieldInput {
    pub fn object(object: impl ModelObject) -> Self {
        FieldInput::Object(Arc::new(object))
    }

    /// Untyped view of the input; objects are flattened to their mapping
    pub fn to_value(&self) -> Value {
        match self {
            FieldInput::Value(value) => value.clone(),
            FieldInput::Object(object) => Value::Object(object.to_mapping()),
        }
    }

    /// Whether this input counts as present for a field of `field_type`
    pub fn is_present(&self, field_type: Option<&FieldType>) -> bool {
        match self {
            FieldInput::Value(value) => is_present(value, field_type),
            FieldInput::Object(_) => true,
        }
    }
}

impl fmt::Debug for FieldInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldInput::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldInput::Object(object) => f.debug_tuple("Object").field(&object.class_name()).finish(),
        }
    }
}

impl fmt::Display for FieldInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldInput::Value(value) => write!(f, "{}", value),
            FieldInput::Object(object) => write!(f, "instance of {}", object.class_name()),
        }
    }
}

macro_rules! impl_from_for_input {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for FieldInput {
                fn from(value: $ty) -> Self {
                    FieldInput::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_from_for_input!(
    Value,
    i32,
    i64,
    u32,
    u64,
    f64,
    bool,
    &str,
    String,
    Vec<Value>,
    serde_json::Map<String, Value>,
);

impl From<Arc<dyn ModelObject>> for FieldInput {
    fn from(object: Arc<dyn ModelObject>) -> Self {
        FieldInput::Object(object)
    }
}

/// A coerced value held in model storage
#[derive(Clone)]
pub enum FieldValue {
    Int(i64),
    Numeric(f64),
    String(String),
    Bool(bool),
    /// Sequence or mapping, kept as given
    Array(Value),
    Object(Arc<dyn ModelObject>),
}

impl FieldValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Numeric(v) => Some(*v),
            FieldValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Value> {
        match self {
            FieldValue::Array(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&dyn ModelObject> {
        match self {
            FieldValue::Object(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    /// Downcast an object value to a concrete type
    pub fn downcast<T: ModelObject>(&self) -> Option<&T> {
        self.as_object()?.as_any().downcast_ref::<T>()
    }

    /// Whether the stored value counts as present for a field of `field_type`
    pub fn is_present(&self, field_type: &FieldType) -> bool {
        match self {
            FieldValue::Object(_) => true,
            other => is_present(&other.to_value(), Some(field_type)),
        }
    }

    /// Untyped form, with nested objects serialized through their own mapping
    pub fn to_value(&self) -> Value {
        match self {
            FieldValue::Int(v) => Value::from(*v),
            FieldValue::Numeric(v) => Value::from(*v),
            FieldValue::String(v) => Value::String(v.clone()),
            FieldValue::Bool(v) => Value::Bool(*v),
            FieldValue::Array(v) => v.clone(),
            FieldValue::Object(v) => Value::Object(v.to_mapping()),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (FieldValue::Int(a), FieldValue::Int(b)) => a == b,
            (FieldValue::Numeric(a), FieldValue::Numeric(b)) => a == b,
            (FieldValue::String(a), FieldValue::String(b)) => a == b,
            (FieldValue::Bool(a), FieldValue::Bool(b)) => a == b,
            (FieldValue::Array(a), FieldValue::Array(b)) => a == b,
            (FieldValue::Object(a), FieldValue::Object(b)) => {
                a.class_name() == b.class_name() && a.to_mapping() == b.to_mapping()
            }
            _ => false,
        }
    }
}

impl fmt::Debug for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Int(v) => f.debug_tuple("Int").field(v).finish(),
            FieldValue::Numeric(v) => f.debug_tuple("Numeric").field(v).finish(),
            FieldValue::String(v) => f.debug_tuple("String").field(v).finish(),
            FieldValue::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            FieldValue::Array(v) => f.debug_tuple("Array").field(v).finish(),
            FieldValue::Object(v) => f
                .debug_tuple("Object")
                .field(&v.class_name())
                .field(&v.to_mapping())
                .finish(),
        }
    }
}

/// Type-aware emptiness check
///
/// Null, `""`, empty sequences and empty mappings are always empty. A numeric
/// zero is present only for `int`/`numeric` fields and `false` only for
/// `bool` fields; for every other type they are empty.
pub fn is_present(value: &Value, field_type: Option<&FieldType>) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b || matches!(field_type, Some(FieldType::Bool)),
        Value::Number(n) => {
            n.as_f64().map_or(true, |v| v != 0.0)
                || matches!(field_type, Some(FieldType::Int | FieldType::Numeric))
        }
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
