//! Models: a schema plus validated storage
//!
//! [`ArrayModel`] works against any compiled [`Schema`]. Typed models
//! implement [`ModelDefinition`] and use [`Model<D>`], which compiles the
//! schema once per type and otherwise behaves like an `ArrayModel`.
//!
//! ```
//! use familiar_models::{FieldDeclaration, Model, ModelDefinition, SchemaDeclaration};
//! use serde_json::json;
//!
//! struct UserDef;
//!
//! impl ModelDefinition for UserDef {
//!     const CLASS: &'static str = "User";
//!
//!     fn declare() -> SchemaDeclaration {
//!         SchemaDeclaration::new()
//!             .field("id", FieldDeclaration::int().required(true))
//!             .field("name", FieldDeclaration::string().default_value("anonymous"))
//!     }
//! }
//!
//! let user = Model::<UserDef>::from_value(json!({ "id": "7" })).unwrap();
//! assert_eq!(user.to_text(), r#"{"id":7,"name":"anonymous"}"#);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::coerce;
use crate::declaration::SchemaDeclaration;
use crate::error::{ModelError, Result};
use crate::registry::ClassRegistry;
use crate::schema::{schema_for, Schema};
use crate::storage::Storage;
use crate::value::{FieldInput, FieldValue};

/// An object that can be stored in an `object` field
pub trait ModelObject: Any + Send + Sync {
    /// Class name matched against a field's declared `class`
    fn class_name(&self) -> &str;

    /// Plain mapping form, used when serializing the owning model
    fn to_mapping(&self) -> Map<String, Value>;

    fn as_any(&self) -> &dyn Any;
}

/// Static description of a typed model
pub trait ModelDefinition: 'static {
    /// Class name of the model, as referenced by object fields
    const CLASS: &'static str;

    /// Whether string input is decoded as JSON text
    const ACCEPTS_TEXT: bool = true;

    fn declare() -> SchemaDeclaration;

    /// Register the classes and factories that object fields refer to
    fn register(_classes: &mut ClassRegistry) {}
}

/// Construction input
#[derive(Debug, Clone)]
pub enum ModelInput {
    /// Untyped data; must be a mapping
    Value(Value),
    /// Serialized JSON text of a mapping
    Text(String),
    /// Field inputs that may already hold hydrated objects
    Fields(HashMap<String, FieldInput>),
}

impl From<Value> for ModelInput {
    fn from(value: Value) -> Self {
        ModelInput::Value(value)
    }
}

impl From<Map<String, Value>> for ModelInput {
    fn from(map: Map<String, Value>) -> Self {
        ModelInput::Value(Value::Object(map))
    }
}

impl From<String> for ModelInput {
    fn from(text: String) -> Self {
        ModelInput::Text(text)
    }
}

impl From<&str> for ModelInput {
    fn from(text: &str) -> Self {
        ModelInput::Text(text.to_string())
    }
}

impl From<HashMap<String, FieldInput>> for ModelInput {
    fn from(fields: HashMap<String, FieldInput>) -> Self {
        ModelInput::Fields(fields)
    }
}

/// A model instance over a shared schema
#[derive(Clone)]
pub struct ArrayModel {
    schema: Arc<Schema>,
    storage: Storage,
}

impl ArrayModel {
    /// Build a model from `input`
    ///
    /// Only fields declared by the schema are read; other keys in the input
    /// are ignored. A declared field the input omits is treated as empty, so
    /// its default applies. Fails without producing a model if any field
    /// fails to coerce or a required field ends up empty.
    pub fn new(schema: Arc<Schema>, input: impl Into<ModelInput>) -> Result<Self> {
        let mut fields = into_fields(&schema, input.into())?;
        let mut storage = Storage::new();

        for (key, _) in schema.fields() {
            let raw = fields.remove(key).unwrap_or(FieldInput::Value(Value::Null));
            coerce::set_field(&schema, &mut storage, key, raw)?;
        }
        coerce::check_required(&schema, &storage)?;

        Ok(Self { schema, storage })
    }

    /// Set a single field, then re-check required fields
    ///
    /// Unlike construction, a key the schema does not declare is an error.
    /// On failure the model is left unchanged.
    pub fn set_field(&mut self, key: &str, value: impl Into<FieldInput>) -> Result<()> {
        let mut storage = self.storage.clone();
        coerce::set_field(&self.schema, &mut storage, key, value.into())?;
        coerce::check_required(&self.schema, &storage)?;
        self.storage = storage;
        Ok(())
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.storage.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.storage.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.storage.iter()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Stored fields as a plain mapping, in declaration order
    pub fn to_mapping(&self) -> Map<String, Value> {
        self.storage.to_mapping()
    }

    /// Compact JSON text of [`to_mapping`](Self::to_mapping)
    pub fn to_text(&self) -> String {
        Value::Object(self.to_mapping()).to_string()
    }

    pub fn to_text_pretty(&self) -> String {
        // a Value tree always serializes
        serde_json::to_string_pretty(&Value::Object(self.to_mapping())).unwrap_or_default()
    }
}

fn into_fields(schema: &Schema, input: ModelInput) -> Result<HashMap<String, FieldInput>> {
    let value = match input {
        ModelInput::Fields(fields) => return Ok(fields),
        ModelInput::Value(value) => value,
        ModelInput::Text(text) => {
            if !schema.accepts_text() {
                return Err(ModelError::input(format!(
                    "{} cannot be built from text",
                    schema.class()
                )));
            }
            serde_json::from_str(&text).map_err(|e| ModelError::input(e.to_string()))?
        }
    };

    match value {
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, FieldInput::Value(value)))
            .collect()),
        other => Err(ModelError::input(format!(
            "{} must be built from a mapping, got {}",
            schema.class(),
            value_kind(&other)
        ))),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a mapping",
    }
}

impl ModelObject for ArrayModel {
    fn class_name(&self) -> &str {
        self.schema.class()
    }

    fn to_mapping(&self) -> Map<String, Value> {
        ArrayModel::to_mapping(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ArrayModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayModel")
            .field("class", &self.schema.class())
            .field("storage", &self.storage)
            .finish()
    }
}

impl PartialEq for ArrayModel {
    fn eq(&self, other: &Self) -> bool {
        self.schema.class() == other.schema.class() && self.storage == other.storage
    }
}

impl Serialize for ArrayModel {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_mapping().serialize(serializer)
    }
}

/// A typed model
pub struct Model<D> {
    inner: ArrayModel,
    _definition: PhantomData<fn() -> D>,
}

impl<D: ModelDefinition> Model<D> {
    pub fn new(input: impl Into<ModelInput>) -> Result<Self> {
        let schema = schema_for::<D>()?;
        Ok(Self {
            inner: ArrayModel::new(schema, input)?,
            _definition: PhantomData,
        })
    }

    pub fn from_value(value: Value) -> Result<Self> {
        Self::new(ModelInput::Value(value))
    }

    pub fn from_text(text: &str) -> Result<Self> {
        Self::new(ModelInput::Text(text.to_string()))
    }

    /// The compiled schema of this model type
    pub fn schema() -> Result<Arc<Schema>> {
        schema_for::<D>()
    }

    pub fn set_field(&mut self, key: &str, value: impl Into<FieldInput>) -> Result<()> {
        self.inner.set_field(key, value)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.inner.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.contains(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.inner.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn to_mapping(&self) -> Map<String, Value> {
        self.inner.to_mapping()
    }

    pub fn to_text(&self) -> String {
        self.inner.to_text()
    }

    pub fn to_text_pretty(&self) -> String {
        self.inner.to_text_pretty()
    }

    pub fn as_array_model(&self) -> &ArrayModel {
        &self.inner
    }

    pub fn into_array_model(self) -> ArrayModel {
        self.inner
    }
}

impl<D> Clone for Model<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _definition: PhantomData,
        }
    }
}

impl<D> PartialEq for Model<D> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<D> fmt::Debug for Model<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.inner, f)
    }
}

impl<D: ModelDefinition> ModelObject for Model<D> {
    fn class_name(&self) -> &str {
        D::CLASS
    }

    fn to_mapping(&self) -> Map<String, Value> {
        self.inner.to_mapping()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<D: ModelDefinition> FromStr for Model<D> {
    type Err = ModelError;

    fn from_str(text: &str) -> Result<Self> {
        Self::from_text(text)
    }
}

impl<D: ModelDefinition> TryFrom<Value> for Model<D> {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl<D> Serialize for Model<D> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.inner.serialize(serializer)
    }
}

impl<'de, D: ModelDefinition> Deserialize<'de> for Model<D> {
    fn deserialize<De: Deserializer<'de>>(deserializer: De) -> std::result::Result<Self, De::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}
