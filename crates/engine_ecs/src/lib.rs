//! # engine_ecs
//!
//! Runtime state for scripted entities: who exists, what is attached to
//! them, who is listening, and which entities fall inside a spatial range.
//!
//! This crate provides:
//!
//! - [`World`]: entity store, component store and query engine kept in
//!   step with each other.
//! - [`EventBus`] and [`publish`]: synchronous, depth-first event dispatch
//!   over any [`EventContext`].
//! - [`QueryEngine`] and [`SpatialIndex`]: persistent range queries over
//!   three numeric component fields, maintained incrementally.
//! - [`ContentResolver`]: the boundary to entity templates.
//! - [`EngineError`] and [`ErrorKind`]: the error taxonomy.

pub mod components;
pub mod content;
pub mod entities;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod query;
pub mod spatial;
pub mod world;

pub use components::{AttachOrigin, ComponentStore, StoredComponent};
pub use content::{ContentError, ContentResolver, NoContent, StaticContent, TemplateComponent};
pub use entities::{EntityRecord, EntityStore};
pub use error::{EngineError, ErrorKind};
pub use events::{
    DEFAULT_MAX_EVENT_DEPTH, EventBus, EventContext, Listener, PublishReport, SubscriberFailure,
    SubscriptionId, publish,
};
pub use lifecycle::LifecycleState;
pub use query::{DEFAULT_QUERY_FIELDS, QueryDefinition, QueryEngine, QueryHandle};
pub use spatial::{AxisRange, QUERY_AXES, QueryBounds, SpatialIndex};
pub use world::World;
