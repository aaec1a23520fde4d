//! Class Registry
//!
//! Resolves the `class` and `initial_function` names used by object field
//! declarations. A class must be registered before a schema can reference it,
//! and an initial function must be a registered factory.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;
use crate::model::{Model, ModelDefinition, ModelObject};

/// Hydrates a raw value into an object instance
pub type Factory = Arc<dyn Fn(&Value) -> Result<Arc<dyn ModelObject>> + Send + Sync>;

/// Known object classes and named factories
#[derive(Clone, Default)]
pub struct ClassRegistry {
    classes: BTreeSet<String>,
    factories: BTreeMap<String, Factory>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a class name so object fields may declare it
    pub fn register_class(&mut self, class: impl Into<String>) -> &mut Self {
        self.classes.insert(class.into());
        self
    }

    /// Register a factory under `name`
    pub fn register_factory<F>(&mut self, name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&Value) -> Result<Arc<dyn ModelObject>> + Send + Sync + 'static,
    {
        self.factories.insert(name.into(), Arc::new(factory));
        self
    }

    /// Register a typed model: its class, plus a factory of the same name
    /// that builds the model from a raw mapping
    pub fn register_model<D: ModelDefinition>(&mut self) -> &mut Self {
        self.register_class(D::CLASS);
        self.register_factory(D::CLASS, |raw: &Value| {
            let model = Model::<D>::from_value(raw.clone())?;
            Ok(Arc::new(model) as Arc<dyn ModelObject>)
        })
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.contains(class)
    }

    pub fn factory(&self, name: &str) -> Option<Factory> {
        self.factories.get(name).cloned()
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(String::as_str)
    }

    /// Merge another registry into this one; entries of `other` win
    pub fn extend(&mut self, other: ClassRegistry) {
        self.classes.extend(other.classes);
        self.factories.extend(other.factories);
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.classes)
            .field("factories", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}
