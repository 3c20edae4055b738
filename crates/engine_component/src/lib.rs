//! # engine_component
//!
//! The "C" in the scripted entity runtime: defines what a component is,
//! which schemas exist, and how entities are identified.
//!
//! This crate provides:
//!
//! - [`FieldValue`]: dynamically typed field data with a fixed [`Shape`].
//! - [`ComponentSchema`] / [`ComponentInstance`]: field layouts and the
//!   per-entity copies handed to script code.
//! - [`ComponentRegistry`]: built-in and custom schemas keyed by
//!   [`ComponentTypeId`].
//! - [`Entity`] / [`EntityAllocator`]: never-reused entity handles.

pub mod component;
pub mod entity;
pub mod error;
pub mod registry;
pub mod value;

pub use component::{ComponentInstance, ComponentSchema, ComponentTypeId, SchemaOrigin};
pub use entity::{Entity, EntityAllocator, EntityKind};
pub use error::ComponentError;
pub use registry::{BUILTIN_COMPONENTS, ComponentRegistry};
pub use value::{FieldValue, Shape};
