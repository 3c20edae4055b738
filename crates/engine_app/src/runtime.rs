//! The script-facing runtime: the world plus its event bus.
//!
//! Every method here mirrors one call of the scripting surface. Mutations
//! take effect immediately; there is no deferred apply.

use engine_component::{ComponentInstance, Entity, EntityKind};
use engine_ecs::{
    ContentResolver, EngineError, EventBus, EventContext, PublishReport, QUERY_AXES,
    QueryBounds, QueryHandle, SubscriptionId, World, publish,
};
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::config::RuntimeConfig;

/// Published after an entity is created.
pub const ENTITY_CREATED_EVENT: &str = "minecraft:entity_created";
/// Published before an entity is torn down.
pub const ENTITY_DESTROYED_EVENT: &str = "minecraft:entity_destroyed";

/// Process-scoped runtime state, owned by the tick driver between
/// `initialize` and `shutdown`.
pub struct Runtime {
    world: World,
    events: EventBus<Runtime>,
    tick: u64,
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("world", &self.world)
            .field("events", &self.events)
            .field("tick", &self.tick)
            .finish()
    }
}

impl EventContext for Runtime {
    fn event_bus(&mut self) -> &mut EventBus<Self> {
        &mut self.events
    }
}

impl Runtime {
    /// A runtime at tick 0 with an empty world.
    #[must_use]
    pub(crate) fn new(config: &RuntimeConfig, content: Box<dyn ContentResolver>) -> Self {
        Self {
            world: World::with_parts(
                engine_component::ComponentRegistry::with_builtins(),
                content,
            ),
            events: EventBus::new(config.max_event_depth),
            tick: 0,
        }
    }

    /// Number of completed `update` calls.
    #[must_use]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Move to the next tick and return its number.
    pub(crate) fn advance_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Read access to the entity world.
    #[must_use]
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Read access to the event bus.
    #[must_use]
    pub fn events(&self) -> &EventBus<Runtime> {
        &self.events
    }

    // -- Entities --

    /// Create an entity, optionally from a content template, and announce it.
    pub fn create_entity(
        &mut self,
        kind: EntityKind,
        template: Option<&str>,
    ) -> Result<Entity, EngineError> {
        let entity = self.world.create_entity(kind, template)?;
        self.announce(ENTITY_CREATED_EVENT, entity);
        Ok(entity)
    }

    /// Destroy an entity. Listeners of the destroyed event still see the
    /// entity and its components.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EngineError> {
        if !self.world.is_valid(entity) {
            return Err(EngineError::EntityNotFound(entity));
        }
        self.announce(ENTITY_DESTROYED_EVENT, entity);
        if !self.world.is_valid(entity) {
            debug!(%entity, "entity destroyed by a listener");
            return Ok(());
        }
        self.world.destroy_entity(entity)
    }

    /// Whether the handle refers to a live entity.
    #[must_use]
    pub fn is_valid_entity(&self, entity: Entity) -> bool {
        self.world.is_valid(entity)
    }

    // -- Components --

    /// Register a custom component from a JSON object of field defaults.
    pub fn register_component(&mut self, identifier: &str, data: &Value) -> Result<(), EngineError> {
        self.world.register_component_json(identifier, data)?;
        Ok(())
    }

    /// Attach a component with default values and return a copy of it.
    pub fn create_component(
        &mut self,
        entity: Entity,
        identifier: &str,
    ) -> Result<ComponentInstance, EngineError> {
        self.world.attach(entity, identifier)
    }

    /// Whether the entity has the component.
    pub fn has_component(&self, entity: Entity, identifier: &str) -> Result<bool, EngineError> {
        self.world.has(entity, identifier)
    }

    /// A local copy of the entity's component.
    pub fn get_component(
        &self,
        entity: Entity,
        identifier: &str,
    ) -> Result<ComponentInstance, EngineError> {
        self.world.get(entity, identifier)
    }

    /// Write a component copy back to the entity.
    pub fn apply_component_changes(
        &mut self,
        entity: Entity,
        instance: &ComponentInstance,
    ) -> Result<(), EngineError> {
        self.world.commit(entity, instance)
    }

    /// Detach a script-attached custom component.
    pub fn destroy_component(&mut self, entity: Entity, identifier: &str) -> Result<(), EngineError> {
        self.world.detach(entity, identifier)
    }

    // -- Events --

    /// Publish an event to every listener, depth first.
    pub fn broadcast_event(
        &mut self,
        event: &str,
        payload: &mut Value,
    ) -> Result<PublishReport, EngineError> {
        publish(self, event, payload)
    }

    /// Subscribe a listener to an event.
    pub fn listen_for_event(
        &mut self,
        event: &str,
        listener: impl Fn(&mut Runtime, &mut Value) -> anyhow::Result<()> + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(event, listener)
    }

    /// Remove a subscription. Returns `false` if it was already gone.
    pub fn stop_listening(&mut self, subscription: SubscriptionId) -> bool {
        self.events.unsubscribe(subscription)
    }

    // -- Queries --

    /// Register a query over `base` ranging on `x`, `y` and `z`.
    pub fn register_query(&mut self, base: Option<&str>) -> Result<QueryHandle, EngineError> {
        self.world.register_query(base)
    }

    /// Register a query ranging over three named fields of `base`.
    pub fn register_query_with_fields(
        &mut self,
        base: Option<&str>,
        fields: [&str; QUERY_AXES],
    ) -> Result<QueryHandle, EngineError> {
        self.world.register_query_with_fields(base, fields)
    }

    /// Require an extra component for membership in a query.
    pub fn add_filter_to_query(
        &mut self,
        query: QueryHandle,
        identifier: &str,
    ) -> Result<(), EngineError> {
        self.world.add_query_filter(query, identifier)
    }

    /// Entities in the query that fall inside `bounds`, ordered by id.
    pub fn get_entities_from_query(
        &self,
        query: QueryHandle,
        bounds: &QueryBounds,
    ) -> Result<Vec<Entity>, EngineError> {
        self.world.query(query, bounds)
    }

    /// Check every query index against the stores.
    pub fn verify_indexes(&self) -> Result<(), EngineError> {
        self.world.verify_indexes()
    }

    /// Publish a lifecycle event for `entity`. The entity operation has
    /// already happened, so publish failures are logged, not returned.
    ///
    /// The payload carries the handle plus the template identifier, if the
    /// entity was built from one.
    fn announce(&mut self, event: &str, entity: Entity) {
        let handle = entity.to_json_with_identifier(self.world.entity_identifier(entity));
        let mut payload = json!({ "entity": handle });
        if let Err(err) = publish(self, event, &mut payload) {
            warn!(event, %entity, error = %err, "lifecycle event dropped");
        }
    }
}
