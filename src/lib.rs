//! Familiar Models
//!
//! Declarative field validation and coercion for map-shaped data. A model
//! declares its fields once (type, required-ness, limits, defaults, nested
//! object classes); incoming untyped data is then checked and coerced against
//! that declaration and can be handed back as a plain mapping or JSON text.
//!
//! ## Features
//!
//! - **Checked Declarations**: Malformed schemas are rejected before any data is read
//! - **Type-Aware Emptiness**: `0` and `false` count as values where the type allows them
//! - **Defaults**: Empty input falls back to the declared default
//! - **Object Hydration**: Nested mappings become model instances via named factories
//! - **Catalogs**: Whole sets of models can be declared in JSON or TOML
//!
//! ## Architecture
//!
//! ```text
//! SchemaDeclaration ──compile──▶ Schema ──┐
//!        ▲                  ▲             ├──▶ ArrayModel / Model<D> ──▶ mapping / JSON text
//!   JSON / TOML       ClassRegistry       │
//!                                  raw input (mapping or JSON text)
//! ```

pub mod catalog;
pub mod coerce;
pub mod config;
pub mod declaration;
pub mod error;
pub mod model;
pub mod registry;
pub mod schema;
pub mod storage;
pub mod value;

pub use catalog::{CatalogFile, SchemaCatalog};
pub use config::{ModelsConfig, OutputFormat};
pub use declaration::{FieldDeclaration, FieldType, Limits, SchemaDeclaration};
pub use error::{ModelError, Result};
pub use model::{ArrayModel, Model, ModelDefinition, ModelInput, ModelObject};
pub use registry::{ClassRegistry, Factory};
pub use schema::{schema_for, FieldDescriptor, ObjectBinding, Schema};
pub use storage::Storage;
pub use value::{FieldInput, FieldValue};
