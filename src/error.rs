//! Error types for model declaration and field coercion

use thiserror::Error;

/// Result type for model operations
pub type Result<T> = std::result::Result<T, ModelError>;

/// Model errors
///
/// Field-level variants carry the name of the offending field so callers can
/// report it without parsing the message.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Invalid declaration of field `{field}`, property `{property}`: {reason}")]
    SchemaDeclaration {
        field: String,
        property: String,
        reason: String,
    },

    #[error("Unknown field: {field}")]
    UnknownField { field: String },

    #[error("Wrong type for {field}: {value} has been given")]
    InvalidType { field: String, value: String },

    #[error("Unsupported type `{type_name}` declared for {field}")]
    UnsupportedType { field: String, type_name: String },

    #[error("Value {value} of {field} is out of range [{}, {}]", fmt_bound(.min), fmt_bound(.max))]
    OutOfRange {
        field: String,
        value: f64,
        min: Option<f64>,
        max: Option<f64>,
    },

    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid model input: {reason}")]
    InputType { reason: String },

    #[error("Unknown model: {name}")]
    UnknownModel { name: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

fn fmt_bound(bound: &Option<f64>) -> String {
    bound.map(|b| b.to_string()).unwrap_or_else(|| "-".to_string())
}

impl ModelError {
    pub(crate) fn declaration(
        field: impl Into<String>,
        property: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::SchemaDeclaration {
            field: field.into(),
            property: property.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_type(field: impl Into<String>, value: impl ToString) -> Self {
        Self::InvalidType {
            field: field.into(),
            value: value.to_string(),
        }
    }

    pub(crate) fn input(reason: impl Into<String>) -> Self {
        Self::InputType {
            reason: reason.into(),
        }
    }

    /// Name of the offending field, for field-level errors
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::SchemaDeclaration { field, .. }
            | Self::UnknownField { field }
            | Self::InvalidType { field, .. }
            | Self::UnsupportedType { field, .. }
            | Self::OutOfRange { field, .. }
            | Self::RequiredFieldMissing { field } => Some(field),
            _ => None,
        }
    }
}
