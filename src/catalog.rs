//! Schema catalogs
//!
//! A catalog file declares several named models at once, so data can be
//! validated without writing a Rust type per model. Every model in the
//! catalog is a known class, with a factory of the same name, so models may
//! nest each other (recursively, too).
//!
//! ## Example catalog (TOML):
//! ```toml
//! root = "User"
//!
//! [models.User.id]
//! type = "int"
//! required = true
//!
//! [models.User.settings]
//! type = "object"
//! required = false
//! class = "Settings"
//! initial_function = "Settings"
//!
//! [models.Settings.theme]
//! type = "string"
//! required = false
//! default = "dark"
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, OnceLock, Weak};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::declaration::SchemaDeclaration;
use crate::error::{ModelError, Result};
use crate::model::{ArrayModel, ModelInput, ModelObject};
use crate::registry::ClassRegistry;
use crate::schema::Schema;

type CompiledSchemas = OnceLock<HashMap<String, Arc<Schema>>>;

/// On-disk form of a catalog
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogFile {
    /// Model used when none is named explicitly
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,

    #[serde(default)]
    pub models: BTreeMap<String, SchemaDeclaration>,
}

impl CatalogFile {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| ModelError::input(e.to_string()))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Read a catalog, as TOML for `.toml` files and JSON otherwise
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&text),
            _ => Self::from_json(&text),
        }
    }
}

/// A set of compiled, mutually referencing model schemas
#[derive(Debug)]
pub struct SchemaCatalog {
    root: Option<String>,
    schemas: Arc<CompiledSchemas>,
}

impl SchemaCatalog {
    /// Compile every model of `file`
    ///
    /// `classes` supplies classes and factories defined outside the catalog;
    /// catalog models take precedence on name clashes.
    pub fn compile(file: &CatalogFile, classes: &ClassRegistry) -> Result<Self> {
        if let Some(root) = &file.root {
            if !file.models.contains_key(root) {
                return Err(ModelError::UnknownModel { name: root.clone() });
            }
        }

        let schemas: Arc<CompiledSchemas> = Arc::new(OnceLock::new());

        let mut registry = classes.clone();
        for name in file.models.keys() {
            let weak = Arc::downgrade(&schemas);
            let class = name.clone();
            registry
                .register_class(name.clone())
                .register_factory(name.clone(), move |raw: &Value| {
                    let model = build(&weak, &class, ModelInput::Value(raw.clone()))?;
                    Ok(Arc::new(model) as Arc<dyn ModelObject>)
                });
        }

        let mut compiled = HashMap::with_capacity(file.models.len());
        for (name, declaration) in &file.models {
            let schema = Schema::compile(name.clone(), declaration, &registry)?;
            compiled.insert(name.clone(), Arc::new(schema));
        }
        debug!(models = compiled.len(), "compiled catalog");

        // freshly created above, so this cannot already be set
        let _ = schemas.set(compiled);

        Ok(Self {
            root: file.root.clone(),
            schemas,
        })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::compile(&CatalogFile::load(path)?, &ClassRegistry::new())
    }

    pub fn root(&self) -> Option<&str> {
        self.root.as_deref()
    }

    pub fn schema(&self, name: &str) -> Option<Arc<Schema>> {
        self.schemas.get()?.get(name).cloned()
    }

    /// Model names, sorted
    pub fn models(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .schemas
            .get()
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Build a model of class `name` from `input`
    pub fn build(&self, name: &str, input: impl Into<ModelInput>) -> Result<ArrayModel> {
        let schema = self
            .schema(name)
            .ok_or_else(|| ModelError::UnknownModel {
                name: name.to_string(),
            })?;
        ArrayModel::new(schema, input)
    }

    /// Build the root model from `input`
    pub fn build_root(&self, input: impl Into<ModelInput>) -> Result<ArrayModel> {
        let root = self.root.as_deref().ok_or_else(|| ModelError::UnknownModel {
            name: "<root>".to_string(),
        })?;
        self.build(root, input)
    }
}

fn build(schemas: &Weak<CompiledSchemas>, name: &str, input: ModelInput) -> Result<ArrayModel> {
    let schema = schemas
        .upgrade()
        .and_then(|schemas| schemas.get()?.get(name).cloned())
        .ok_or_else(|| ModelError::UnknownModel {
            name: name.to_string(),
        })?;
    ArrayModel::new(schema, input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::FieldValue;
    use serde_json::json;

    fn catalog() -> SchemaCatalog {
        let file: CatalogFile = serde_json::from_value(json!({
            "root": "Node",
            "models": {
                "Node": {
                    "name": { "type": "string", "required": true },
                    "child": { "type": "object", "required": false, "class": "Node", "initial_function": "Node" }
                }
            }
        }))
        .unwrap();
        SchemaCatalog::compile(&file, &ClassRegistry::new()).unwrap()
    }

    #[test]
    fn test_recursive_models() {
        let catalog = catalog();
        let node = catalog
            .build_root(json!({ "name": "a", "child": { "name": "b", "child": { "name": "c" } } }))
            .unwrap();

        let child = node.get("child").and_then(FieldValue::downcast::<ArrayModel>).unwrap();
        assert_eq!(child.get("name").and_then(FieldValue::as_str), Some("b"));
        assert_eq!(
            node.to_text(),
            r#"{"name":"a","child":{"name":"b","child":{"name":"c"}}}"#
        );
    }

    #[test]
    fn test_nested_errors_propagate() {
        let catalog = catalog();
        let err = catalog
            .build_root(json!({ "name": "a", "child": { "child": { "name": "c" } } }))
            .unwrap_err();
        match err {
            ModelError::RequiredFieldMissing { field } => assert_eq!(field, "name"),
            other => panic!("Expected RequiredFieldMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_root() {
        let file = CatalogFile {
            root: Some("Missing".to_string()),
            models: BTreeMap::new(),
        };
        assert!(matches!(
            SchemaCatalog::compile(&file, &ClassRegistry::new()),
            Err(ModelError::UnknownModel { .. })
        ));
    }

    #[test]
    fn test_models_listing() {
        let catalog = catalog();
        assert_eq!(catalog.models(), vec!["Node"]);
        assert_eq!(catalog.root(), Some("Node"));
        assert!(matches!(catalog.build("Leaf", json!({})), Err(ModelError::UnknownModel { .. })));
    }
}
