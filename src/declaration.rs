//! Declarative schema data
//!
//! A [`SchemaDeclaration`] is the raw, unchecked description of a model's
//! fields, as written by the model author in Rust or loaded from a JSON/TOML
//! file. It only becomes usable once compiled into a [`Schema`](crate::Schema),
//! which is where well-formedness is enforced.
//!
//! ## Example declaration (JSON):
//! ```json
//! {
//!   "id":       { "type": "int", "required": true, "limits": { "min": 0, "max": 1000 } },
//!   "name":     { "type": "string", "required": false, "default": "anonymous" },
//!   "settings": { "type": "object", "required": true,
//!                 "class": "Settings", "initial_function": "Settings" }
//! }
//! ```

use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Declared type of a field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    Int,
    Numeric,
    String,
    Bool,
    Array,
    Object,
    /// A tag this crate does not know how to coerce
    Other(String),
}

impl FieldType {
    /// Tag used in declarations (e.g. "int")
    pub fn as_str(&self) -> &str {
        match self {
            FieldType::Int => "int",
            FieldType::Numeric => "numeric",
            FieldType::String => "string",
            FieldType::Bool => "bool",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Other(tag) => tag,
        }
    }

    /// Whether `limits` may be declared for this type
    pub fn supports_limits(&self) -> bool {
        matches!(self, FieldType::Int | FieldType::Numeric)
    }
}

impl From<String> for FieldType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "int" => FieldType::Int,
            "numeric" => FieldType::Numeric,
            "string" => FieldType::String,
            "bool" => FieldType::Bool,
            "array" => FieldType::Array,
            "object" => FieldType::Object,
            _ => FieldType::Other(tag),
        }
    }
}

impl From<&str> for FieldType {
    fn from(tag: &str) -> Self {
        FieldType::from(tag.to_string())
    }
}

impl From<FieldType> for String {
    fn from(field_type: FieldType) -> Self {
        field_type.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric bounds for int/numeric fields (both inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Limits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Limits {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }
}

/// A property that was written but could not be read
#[derive(Debug, Clone, PartialEq)]
pub struct MalformedProperty {
    pub property: String,
    pub reason: String,
}

/// One field of a declaration, exactly as written
///
/// Every property is optional here so that malformed declarations can be
/// represented and rejected with a precise error. Parsing never fails on a
/// bad property; it is recorded in `malformed` and reported on compile.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldDeclaration {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limits: Option<Limits>,

    /// Class name the value must be an instance of (object fields)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    /// Name of the factory used to hydrate raw values (object fields)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initial_function: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,

    #[serde(skip)]
    pub malformed: Vec<MalformedProperty>,
}

impl FieldDeclaration {
    /// Start a declaration with `type` set and `required = false`
    pub fn new(field_type: impl Into<FieldType>) -> Self {
        Self {
            field_type: Some(field_type.into()),
            required: Some(false),
            ..Default::default()
        }
    }

    pub fn int() -> Self {
        Self::new(FieldType::Int)
    }

    pub fn numeric() -> Self {
        Self::new(FieldType::Numeric)
    }

    pub fn string() -> Self {
        Self::new(FieldType::String)
    }

    pub fn bool() -> Self {
        Self::new(FieldType::Bool)
    }

    pub fn array() -> Self {
        Self::new(FieldType::Array)
    }

    /// Object field of the given class
    pub fn object(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            ..Self::new(FieldType::Object)
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = Some(required);
        self
    }

    pub fn limits(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.limits = Some(Limits::new(min, max));
        self
    }

    pub fn initial_function(mut self, name: impl Into<String>) -> Self {
        self.initial_function = Some(name.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Read a declaration from its untyped properties
    pub fn from_properties(properties: Value) -> Self {
        let mut declaration = Self::default();

        let properties = match properties {
            Value::Object(properties) => properties,
            other => {
                declaration.malformed.push(MalformedProperty {
                    property: "declaration".to_string(),
                    reason: format!("expected a mapping of properties, got {}", other),
                });
                return declaration;
            }
        };

        for (property, value) in properties {
            let read = match property.as_str() {
                "type" => value
                    .as_str()
                    .map(|tag| declaration.field_type = Some(FieldType::from(tag)))
                    .ok_or("expected a type name"),
                "required" => value
                    .as_bool()
                    .map(|required| declaration.required = Some(required))
                    .ok_or("expected a boolean"),
                "limits" => serde_json::from_value::<Limits>(value.clone())
                    .map(|limits| declaration.limits = Some(limits))
                    .map_err(|_| "expected a mapping with numeric min and/or max"),
                "class" => value
                    .as_str()
                    .map(|class| declaration.class = Some(class.to_string()))
                    .ok_or("expected a class name"),
                "initial_function" | "initialFunction" => value
                    .as_str()
                    .map(|name| declaration.initial_function = Some(name.to_string()))
                    .ok_or("expected a factory name"),
                "default" => {
                    declaration.default = Some(value.clone());
                    Ok(())
                }
                _ => Err("unknown property"),
            };

            if let Err(reason) = read {
                declaration.malformed.push(MalformedProperty {
                    reason: format!("{}, got {}", reason, value),
                    property,
                });
            }
        }

        declaration
    }
}

impl<'de> Deserialize<'de> for FieldDeclaration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_properties(Value::deserialize(deserializer)?))
    }
}

/// Ordered set of field declarations for one model
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaDeclaration {
    fields: Vec<(String, FieldDeclaration)>,
}

impl SchemaDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field; a repeated name replaces the earlier declaration in place
    pub fn field(mut self, name: impl Into<String>, declaration: FieldDeclaration) -> Self {
        self.insert(name.into(), declaration);
        self
    }

    pub fn insert(&mut self, name: String, declaration: FieldDeclaration) {
        match self.fields.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = declaration,
            None => self.fields.push((name, declaration)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldDeclaration> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldDeclaration)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Parse a declaration from JSON text
    pub fn from_json(text: &str) -> crate::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::ModelError::input(e.to_string()))
    }

    /// Parse a declaration from TOML text
    pub fn from_toml(text: &str) -> crate::Result<Self> {
        Ok(toml::from_str(text)?)
    }
}

impl Serialize for SchemaDeclaration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, declaration) in &self.fields {
            map.serialize_entry(name, declaration)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for SchemaDeclaration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DeclarationVisitor;

        impl<'de> Visitor<'de> for DeclarationVisitor {
            type Value = SchemaDeclaration;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of field names to field declarations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut declaration = SchemaDeclaration::new();
                while let Some((name, field)) = access.next_entry::<String, FieldDeclaration>()? {
                    declaration.insert(name, field);
                }
                Ok(declaration)
            }
        }

        deserializer.deserialize_map(DeclarationVisitor)
    }
}
