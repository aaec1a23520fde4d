//! Compiled schemas
//!
//! [`Schema::compile`] checks a [`SchemaDeclaration`] for internal consistency
//! and resolves its class and factory names. Compilation is a pure function of
//! the declaration and the registry, so compiling the same declaration twice
//! (or from two threads) yields the same result.
//!
//! Typed models compile their schema once per type; see [`schema_for`].

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock, PoisonError, RwLock};

use serde_json::Value;
use tracing::debug;

use crate::declaration::{FieldDeclaration, FieldType, Limits, SchemaDeclaration};
use crate::error::{ModelError, Result};
use crate::model::ModelDefinition;
use crate::registry::{ClassRegistry, Factory};

const PROPERTY_TYPE: &str = "type";
const PROPERTY_REQUIRED: &str = "required";
const PROPERTY_CLASS: &str = "class";
const PROPERTY_INITIAL_FUNCTION: &str = "initial_function";
const PROPERTY_LIMITS: &str = "limits";

/// Class binding of an object field
#[derive(Clone)]
pub struct ObjectBinding {
    pub class: String,
    pub initial_function: Option<(String, Factory)>,
}

impl ObjectBinding {
    pub fn factory(&self) -> Option<&Factory> {
        self.initial_function.as_ref().map(|(_, f)| f)
    }
}

impl fmt::Debug for ObjectBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectBinding")
            .field("class", &self.class)
            .field(
                "initial_function",
                &self.initial_function.as_ref().map(|(name, _)| name),
            )
            .finish()
    }
}

/// A validated field descriptor
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub field_type: FieldType,
    pub required: bool,
    pub limits: Option<Limits>,
    /// Present iff `field_type` is `object`
    pub object: Option<ObjectBinding>,
    pub default: Option<Value>,
}

/// A validated, immutable schema for one model class
#[derive(Debug, Clone)]
pub struct Schema {
    class: String,
    fields: Vec<(String, FieldDescriptor)>,
    accepts_text: bool,
}

impl Schema {
    /// Validate `declaration` and resolve its object classes against `registry`
    ///
    /// Fails on the first malformed field with
    /// [`ModelError::SchemaDeclaration`].
    pub fn compile(
        class: impl Into<String>,
        declaration: &SchemaDeclaration,
        registry: &ClassRegistry,
    ) -> Result<Self> {
        let class = class.into();
        let mut fields = Vec::with_capacity(declaration.len());

        for (name, field) in declaration.iter() {
            fields.push((name.to_string(), compile_field(name, field, registry)?));
        }

        debug!(class = %class, fields = fields.len(), "compiled schema");

        Ok(Self {
            class,
            fields,
            accepts_text: true,
        })
    }

    /// Allow or forbid constructing models of this schema from text
    pub fn with_text_input(mut self, accepts_text: bool) -> Self {
        self.accepts_text = accepts_text;
        self
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn accepts_text(&self) -> bool {
        self.accepts_text
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, d)| d)
    }

    /// Declaration position and descriptor of a field
    pub fn lookup(&self, name: &str) -> Option<(usize, &FieldDescriptor)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, (n, _))| n == name)
            .map(|(position, (_, d))| (position, d))
    }

    /// Position of a field in declaration order
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|(n, _)| n == name)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields.iter().map(|(n, d)| (n.as_str(), d))
    }

    pub fn required_fields(&self) -> impl Iterator<Item = (&str, &FieldDescriptor)> {
        self.fields().filter(|(_, d)| d.required)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn compile_field(
    name: &str,
    field: &FieldDeclaration,
    registry: &ClassRegistry,
) -> Result<FieldDescriptor> {
    if let Some(malformed) = field.malformed.first() {
        return Err(ModelError::declaration(
            name,
            malformed.property.as_str(),
            malformed.reason.as_str(),
        ));
    }

    let field_type = field
        .field_type
        .clone()
        .ok_or_else(|| ModelError::declaration(name, PROPERTY_TYPE, "missing required property"))?;
    let required = field
        .required
        .ok_or_else(|| ModelError::declaration(name, PROPERTY_REQUIRED, "missing required property"))?;

    let object = if field_type == FieldType::Object {
        Some(compile_object_binding(name, field, registry)?)
    } else {
        if field.class.is_some() {
            return Err(ModelError::declaration(
                name,
                PROPERTY_CLASS,
                "only object types may declare this property",
            ));
        }
        if field.initial_function.is_some() {
            return Err(ModelError::declaration(
                name,
                PROPERTY_INITIAL_FUNCTION,
                "only object types may declare this property",
            ));
        }
        None
    };

    if let Some(limits) = field.limits {
        if !field_type.supports_limits() {
            return Err(ModelError::declaration(
                name,
                PROPERTY_LIMITS,
                format!("limits are not available for type {}", field_type),
            ));
        }
        if let (Some(min), Some(max)) = (limits.min, limits.max) {
            if min > max {
                return Err(ModelError::declaration(
                    name,
                    PROPERTY_LIMITS,
                    format!("min {} is greater than max {}", min, max),
                ));
            }
        }
    }

    Ok(FieldDescriptor {
        field_type,
        required,
        limits: field.limits,
        object,
        default: field.default.clone(),
    })
}

fn compile_object_binding(
    name: &str,
    field: &FieldDeclaration,
    registry: &ClassRegistry,
) -> Result<ObjectBinding> {
    let class = match field.class.as_deref() {
        Some(class) if !class.is_empty() => class,
        _ => {
            return Err(ModelError::declaration(
                name,
                PROPERTY_CLASS,
                "object fields must declare a class",
            ))
        }
    };

    if !registry.has_class(class) {
        return Err(ModelError::declaration(
            name,
            PROPERTY_CLASS,
            format!("class {} does not exist", class),
        ));
    }

    let initial_function = match field.initial_function.as_deref() {
        None | Some("") => None,
        Some(function) => {
            let factory = registry.factory(function).ok_or_else(|| {
                ModelError::declaration(
                    name,
                    PROPERTY_INITIAL_FUNCTION,
                    format!("initial function {} is not a registered factory", function),
                )
            })?;
            Some((function.to_string(), factory))
        }
    };

    Ok(ObjectBinding {
        class: class.to_string(),
        initial_function,
    })
}

static SCHEMAS: LazyLock<RwLock<HashMap<TypeId, Arc<Schema>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Compiled schema of a typed model, compiled on first use and cached
///
/// A failed compilation is not cached; every later call reports the same
/// error again.
pub fn schema_for<D: ModelDefinition>() -> Result<Arc<Schema>> {
    let key = TypeId::of::<D>();

    if let Some(schema) = SCHEMAS
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(&key)
    {
        return Ok(Arc::clone(schema));
    }

    let mut registry = ClassRegistry::new();
    D::register(&mut registry);
    let schema = Schema::compile(D::CLASS, &D::declare(), &registry)?.with_text_input(D::ACCEPTS_TEXT);

    let mut cache = SCHEMAS.write().unwrap_or_else(PoisonError::into_inner);
    Ok(Arc::clone(cache.entry(key).or_insert_with(|| Arc::new(schema))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compile(declaration: Value) -> Result<Schema> {
        let mut registry = ClassRegistry::new();
        registry
            .register_class("Settings")
            .register_factory("settings_from_value", |_raw: &Value| {
                Err(ModelError::input("unused"))
            });
        let declaration: SchemaDeclaration = serde_json::from_value(declaration).unwrap();
        Schema::compile("User", &declaration, &registry)
    }

    fn declaration_error(declaration: Value) -> (String, String) {
        match compile(declaration) {
            Err(ModelError::SchemaDeclaration { field, property, .. }) => (field, property),
            other => panic!("Expected SchemaDeclaration error, got {:?}", other),
        }
    }

    #[test]
    fn test_compile_well_formed() {
        let schema = compile(json!({
            "id": { "type": "int", "required": true, "limits": { "min": 0, "max": 1000 } },
            "settings": {
                "type": "object", "required": false,
                "class": "Settings", "initial_function": "settings_from_value"
            }
        }))
        .unwrap();

        assert_eq!(schema.class(), "User");
        assert_eq!(schema.len(), 2);
        let settings = schema.field("settings").unwrap();
        let binding = settings.object.as_ref().unwrap();
        assert_eq!(binding.class, "Settings");
        assert!(binding.factory().is_some());
        assert_eq!(schema.required_fields().count(), 1);
    }

    #[test]
    fn test_missing_type_or_required() {
        assert_eq!(
            declaration_error(json!({ "id": { "required": true } })),
            ("id".to_string(), "type".to_string())
        );
        assert_eq!(
            declaration_error(json!({ "id": { "type": "int" } })),
            ("id".to_string(), "required".to_string())
        );
    }

    #[test]
    fn test_object_requires_known_class() {
        assert_eq!(
            declaration_error(json!({ "s": { "type": "object", "required": true } })),
            ("s".to_string(), "class".to_string())
        );
        assert_eq!(
            declaration_error(json!({ "s": { "type": "object", "required": true, "class": "" } })),
            ("s".to_string(), "class".to_string())
        );
        assert_eq!(
            declaration_error(json!({ "s": { "type": "object", "required": true, "class": "Profile" } })),
            ("s".to_string(), "class".to_string())
        );
    }

    #[test]
    fn test_object_initial_function_must_resolve() {
        assert_eq!(
            declaration_error(json!({
                "s": { "type": "object", "required": true, "class": "Settings", "initial_function": "nope" }
            })),
            ("s".to_string(), "initial_function".to_string())
        );
    }

    #[test]
    fn test_only_objects_declare_class() {
        assert_eq!(
            declaration_error(json!({ "n": { "type": "string", "required": true, "class": "Settings" } })),
            ("n".to_string(), "class".to_string())
        );
        assert_eq!(
            declaration_error(json!({
                "n": { "type": "array", "required": true, "initial_function": "settings_from_value" }
            })),
            ("n".to_string(), "initial_function".to_string())
        );
    }

    #[test]
    fn test_limits_only_for_numbers() {
        assert_eq!(
            declaration_error(json!({ "name": { "type": "string", "required": false, "limits": { "max": 3 } } })),
            ("name".to_string(), "limits".to_string())
        );
        assert!(compile(json!({ "x": { "type": "numeric", "required": false, "limits": { "max": 3 } } })).is_ok());
    }

    #[test]
    fn test_limits_must_be_ordered() {
        assert_eq!(
            declaration_error(json!({ "x": { "type": "int", "required": false, "limits": { "min": 5, "max": 1 } } })),
            ("x".to_string(), "limits".to_string())
        );
    }

    #[test]
    fn test_malformed_property_values() {
        assert_eq!(
            declaration_error(json!({ "id": { "type": "int", "required": "yes" } })),
            ("id".to_string(), "required".to_string())
        );
        assert_eq!(
            declaration_error(json!({ "id": { "type": 3, "required": true } })),
            ("id".to_string(), "type".to_string())
        );
        assert_eq!(
            declaration_error(json!({ "x": { "type": "int", "required": true, "limits": { "min": "low" } } })),
            ("x".to_string(), "limits".to_string())
        );
        assert_eq!(
            declaration_error(json!({ "x": { "type": "int", "required": true, "limits": { "step": 2 } } })),
            ("x".to_string(), "limits".to_string())
        );
    }

    #[test]
    fn test_unknown_property_rejected() {
        let err = compile(json!({ "id": { "type": "int", "required": true, "size": 4 } })).unwrap_err();
        assert_eq!(err.field(), Some("id"));
        assert!(err.to_string().contains("property `size`: unknown property"));
    }

    #[test]
    fn test_lookup_returns_position() {
        let schema = compile(json!({
            "id": { "type": "int", "required": true },
            "name": { "type": "string", "required": false }
        }))
        .unwrap();
        let (position, descriptor) = schema.lookup("name").unwrap();
        assert_eq!(position, 1);
        assert_eq!(descriptor.field_type, FieldType::String);
        assert_eq!(schema.lookup("name").map(|(p, _)| p), schema.position("name"));
        assert!(schema.lookup("missing").is_none());
    }

    #[test]
    fn test_first_violation_wins() {
        let (field, _) = declaration_error(json!({
            "ok": { "type": "int", "required": true },
            "bad1": { "type": "bool" },
            "bad2": { "required": true }
        }));
        assert_eq!(field, "bad1");
    }

    #[test]
    fn test_unknown_type_tag_compiles() {
        let schema = compile(json!({ "when": { "type": "date", "required": false } })).unwrap();
        assert_eq!(
            schema.field("when").unwrap().field_type,
            FieldType::Other("date".to_string())
        );
    }

    #[test]
    fn test_compile_is_repeatable() {
        let declaration = json!({ "id": { "type": "int", "required": true } });
        let a = compile(declaration.clone()).unwrap();
        let b = compile(declaration).unwrap();
        assert_eq!(a.position("id"), b.position("id"));
        assert!(a.accepts_text());
    }
}
