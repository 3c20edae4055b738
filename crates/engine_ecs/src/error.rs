//! Runtime error types.
//!
//! Every fallible operation of the runtime returns an [`EngineError`]. None of
//! them are fatal: the caller gets a failure result and the world is left as
//! it was before the call.

use engine_component::{ComponentError, Entity};
use thiserror::Error;

use crate::lifecycle::LifecycleState;

/// Errors returned by the entity, component, query and event operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Schema registration or field validation failed.
    #[error(transparent)]
    Component(#[from] ComponentError),

    #[error("{0} does not exist")]
    EntityNotFound(Entity),

    #[error("component '{component}' not found on {entity}")]
    ComponentNotFound { component: String, entity: Entity },

    #[error("query {0} does not exist")]
    QueryNotFound(u32),

    #[error("entity template '{0}' could not be resolved")]
    TemplateNotFound(String),

    /// Built-in components and components attached by a template stay on
    /// the entity until it is destroyed.
    #[error("component '{component}' cannot be removed from {entity}")]
    NotRemovable { component: String, entity: Entity },

    #[error("'{operation}' called while the runtime is {state}")]
    LifecycleViolation {
        operation: &'static str,
        state: LifecycleState,
    },

    #[error("publishing '{event}' exceeded the maximum event depth of {limit}")]
    ReentrancyLimitExceeded { event: String, limit: usize },

    /// A spatial index diverged from the component store.
    #[error("index of query {query} is inconsistent: {detail}")]
    IndexCorruption { query: u32, detail: String },
}

/// Coarse classification of [`EngineError`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    DuplicateIdentifier,
    InvalidIdentifier,
    InvalidSchema,
    SchemaMismatch,
    NotRemovable,
    LifecycleViolation,
    ReentrancyLimitExceeded,
    Internal,
}

impl EngineError {
    /// Returns the class of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Component(err) => match err {
                ComponentError::InvalidIdentifier(_) => ErrorKind::InvalidIdentifier,
                ComponentError::DuplicateIdentifier(_) => ErrorKind::DuplicateIdentifier,
                ComponentError::UnknownComponent(_) | ComponentError::UnknownField { .. } => {
                    ErrorKind::NotFound
                }
                ComponentError::SchemaMismatch { .. } => ErrorKind::SchemaMismatch,
                ComponentError::InvalidSchema { .. } => ErrorKind::InvalidSchema,
            },
            EngineError::EntityNotFound(_)
            | EngineError::ComponentNotFound { .. }
            | EngineError::QueryNotFound(_)
            | EngineError::TemplateNotFound(_) => ErrorKind::NotFound,
            EngineError::NotRemovable { .. } => ErrorKind::NotRemovable,
            EngineError::LifecycleViolation { .. } => ErrorKind::LifecycleViolation,
            EngineError::ReentrancyLimitExceeded { .. } => ErrorKind::ReentrancyLimitExceeded,
            EngineError::IndexCorruption { .. } => ErrorKind::Internal,
        }
    }
}
