//! Errors raised by the component registry and field validation.

use crate::value::Shape;

/// Errors that can occur while registering schemas or validating field data.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ComponentError {
    /// The identifier is not of the form `namespace:name`.
    #[error("identifier '{0}' must be namespaced as 'namespace:name'")]
    InvalidIdentifier(String),

    /// A schema with this identifier (or one hashing to the same type id) exists.
    #[error("component '{0}' is already registered")]
    DuplicateIdentifier(String),

    /// No schema is registered under this identifier.
    #[error("component '{0}' is not registered")]
    UnknownComponent(String),

    /// The component has no field with this name.
    #[error("component '{component}' has no field '{field}'")]
    UnknownField { component: String, field: String },

    /// A write would change the shape of a field.
    #[error("field '{field}' of '{component}' expects {expected}, got {found}")]
    SchemaMismatch {
        component: String,
        field: String,
        expected: Shape,
        found: Shape,
    },

    /// Schema or override data could not be turned into field values.
    #[error("invalid data for '{component}': {message}")]
    InvalidSchema { component: String, message: String },
}
