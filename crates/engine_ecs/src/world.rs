//! The world: entity, component and query state behind one API.
//!
//! Components are schema-defined at runtime, not Rust types. The world keeps
//! the stores consistent with each other: every attach, detach, commit,
//! create and destroy is forwarded to the query engine before the call
//! returns, so a query evaluated afterwards always sees the new state.

use std::sync::Arc;

use engine_component::{
    ComponentInstance, ComponentRegistry, ComponentSchema, Entity, EntityKind, FieldValue,
};
use indexmap::IndexMap;
use tracing::{debug, info, trace};

use crate::components::{AttachOrigin, ComponentStore, StoredComponent};
use crate::content::{ContentResolver, NoContent};
use crate::entities::EntityStore;
use crate::error::EngineError;
use crate::query::{DEFAULT_QUERY_FIELDS, QueryDefinition, QueryEngine, QueryHandle};
use crate::spatial::{QUERY_AXES, QueryBounds};

/// Entity, component and query state.
pub struct World {
    registry: ComponentRegistry,
    entities: EntityStore,
    components: ComponentStore,
    queries: QueryEngine,
    content: Box<dyn ContentResolver>,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("schemas", &self.registry.len())
            .field("entities", &self.entities.len())
            .field("components", &self.components.len())
            .field("queries", &self.queries.len())
            .finish()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    /// A world with the built-in schemas and no content templates.
    #[must_use]
    pub fn new() -> Self {
        Self::with_content(NoContent)
    }

    /// A world with the built-in schemas and the given template source.
    #[must_use]
    pub fn with_content(content: impl ContentResolver + 'static) -> Self {
        Self::with_parts(ComponentRegistry::with_builtins(), Box::new(content))
    }

    /// A world over an existing registry and template source.
    #[must_use]
    pub fn with_parts(registry: ComponentRegistry, content: Box<dyn ContentResolver>) -> Self {
        Self {
            registry,
            entities: EntityStore::new(),
            components: ComponentStore::new(),
            queries: QueryEngine::new(),
            content,
        }
    }

    /// The schemas known to this world.
    #[must_use]
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    // -- Schemas --

    /// Register a custom component schema.
    pub fn register_component(
        &mut self,
        identifier: &str,
        fields: IndexMap<String, FieldValue>,
    ) -> Result<Arc<ComponentSchema>, EngineError> {
        Ok(self.registry.register(identifier, fields)?)
    }

    /// Register a custom component schema from a JSON object of defaults.
    pub fn register_component_json(
        &mut self,
        identifier: &str,
        data: &serde_json::Value,
    ) -> Result<Arc<ComponentSchema>, EngineError> {
        Ok(self.registry.register_json(identifier, data)?)
    }

    // -- Entity lifecycle --

    /// Create an entity, optionally populated from a content template.
    ///
    /// If any template component fails to attach, the half-built entity is
    /// destroyed and the error returned.
    pub fn create_entity(
        &mut self,
        kind: EntityKind,
        template: Option<&str>,
    ) -> Result<Entity, EngineError> {
        let components = match template {
            Some(identifier) => self
                .content
                .resolve_template(identifier)
                .ok_or_else(|| EngineError::TemplateNotFound(identifier.to_string()))?,
            None => Vec::new(),
        };

        let entity = self.entities.create_from(kind, template);
        self.queries.entity_created(entity, &self.components);

        for component in &components {
            let attached = self.registry.resolve(&component.component).map_err(EngineError::from);
            let attached = attached.and_then(|schema| {
                self.attach_schema(entity, &schema, AttachOrigin::Template, &component.overrides)
            });
            if let Err(err) = attached {
                debug!(%entity, template, error = %err, "template attach failed, rolling back");
                self.destroy_entity(entity)?;
                return Err(err);
            }
        }

        debug!(%entity, template, components = components.len(), "created entity");
        Ok(entity)
    }

    /// Destroy an entity and every component attached to it.
    pub fn destroy_entity(&mut self, entity: Entity) -> Result<(), EngineError> {
        let record = self
            .entities
            .remove(entity)
            .ok_or(EngineError::EntityNotFound(entity))?;

        for type_id in &record.components {
            self.components.remove(*type_id, entity.id);
            self.queries
                .component_changed(*type_id, entity, &self.components);
        }
        self.queries.entity_destroyed(entity.id);

        debug!(%entity, components = record.components.len(), "destroyed entity");
        Ok(())
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.entities.is_valid(entity)
    }

    /// Template identifier the entity was built from, if any.
    #[must_use]
    pub fn entity_identifier(&self, entity: Entity) -> Option<&str> {
        self.entities.record(entity)?.template.as_deref()
    }

    /// The entity handle as event payload JSON, with `__identifier__` set
    /// when the entity came from a template.
    pub fn entity_json(&self, entity: Entity) -> Result<serde_json::Value, EngineError> {
        self.ensure_valid(entity)?;
        Ok(entity.to_json_with_identifier(self.entity_identifier(entity)))
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Live entities ordered by id.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.entities.handles()
    }

    /// Identifiers of the components attached to an entity, in attach order.
    pub fn components_of(&self, entity: Entity) -> Result<Vec<&str>, EngineError> {
        let record = self
            .entities
            .record(entity)
            .ok_or(EngineError::EntityNotFound(entity))?;
        Ok(record
            .components
            .iter()
            .filter_map(|type_id| self.registry.get(*type_id))
            .map(|schema| schema.identifier())
            .collect())
    }

    // -- Component operations --

    /// Attach a component with default values, or return the existing one.
    pub fn attach(
        &mut self,
        entity: Entity,
        identifier: &str,
    ) -> Result<ComponentInstance, EngineError> {
        self.ensure_valid(entity)?;
        let schema = self.registry.resolve(identifier)?;
        self.attach_schema(entity, &schema, AttachOrigin::Script, &IndexMap::new())
    }

    /// Attach `schema` with `overrides` applied over its defaults.
    ///
    /// If the component is already attached, the overrides are applied to
    /// the stored values instead, so a template listing a component twice
    /// ends up with both override sets.
    fn attach_schema(
        &mut self,
        entity: Entity,
        schema: &Arc<ComponentSchema>,
        origin: AttachOrigin,
        overrides: &IndexMap<String, FieldValue>,
    ) -> Result<ComponentInstance, EngineError> {
        let type_id = schema.type_id();
        let existing = self
            .components
            .get(type_id, entity.id)
            .map(|stored| stored.values.clone());
        let attached = existing.is_some();
        let mut values = existing.unwrap_or_else(|| schema.defaults());
        if attached && overrides.is_empty() {
            return Ok(ComponentInstance::new(Arc::clone(schema), entity, values));
        }

        for (field, value) in overrides {
            let index = schema.field_index(field).ok_or_else(|| {
                engine_component::ComponentError::UnknownField {
                    component: schema.identifier().to_string(),
                    field: field.clone(),
                }
            })?;
            schema.check_field(index, value)?;
            values[index] = value.clone();
        }

        if attached {
            if let Some(stored) = self.components.get_mut(type_id, entity.id) {
                stored.values.clone_from(&values);
            }
        } else {
            let record = self
                .entities
                .record_mut(entity)
                .ok_or(EngineError::EntityNotFound(entity))?;
            record.components.push(type_id);
            self.components.insert(
                type_id,
                entity.id,
                StoredComponent {
                    values: values.clone(),
                    origin,
                },
            );
        }
        self.queries
            .component_changed(type_id, entity, &self.components);

        trace!(%entity, component = schema.identifier(), ?origin, attached, "attached component");
        Ok(ComponentInstance::new(Arc::clone(schema), entity, values))
    }

    /// Returns whether the entity has the component.
    pub fn has(&self, entity: Entity, identifier: &str) -> Result<bool, EngineError> {
        self.ensure_valid(entity)?;
        let schema = self.registry.resolve(identifier)?;
        Ok(self.components.contains(schema.type_id(), entity.id))
    }

    /// A copy of the entity's component. Edits to the copy stay local until
    /// passed to [`World::commit`].
    pub fn get(&self, entity: Entity, identifier: &str) -> Result<ComponentInstance, EngineError> {
        self.ensure_valid(entity)?;
        let schema = self.registry.resolve(identifier)?;
        let stored = self
            .components
            .get(schema.type_id(), entity.id)
            .ok_or_else(|| EngineError::ComponentNotFound {
                component: identifier.to_string(),
                entity,
            })?;
        Ok(ComponentInstance::new(schema, entity, stored.values.clone()))
    }

    /// Write an instance's values onto `entity` and update every query that
    /// indexes the component.
    ///
    /// The instance may have been read from another entity; only its
    /// component type and values are used. On error nothing is written.
    pub fn commit(
        &mut self,
        entity: Entity,
        instance: &ComponentInstance,
    ) -> Result<(), EngineError> {
        self.ensure_valid(entity)?;
        let schema = self.registry.resolve(instance.identifier())?;
        schema.check_values(instance.values())?;

        let stored = self
            .components
            .get_mut(schema.type_id(), entity.id)
            .ok_or_else(|| EngineError::ComponentNotFound {
                component: schema.identifier().to_string(),
                entity,
            })?;
        stored.values.clone_from_slice(instance.values());
        self.queries
            .component_changed(schema.type_id(), entity, &self.components);

        trace!(%entity, component = schema.identifier(), "committed component");
        Ok(())
    }

    /// Remove a script-attached custom component.
    pub fn detach(&mut self, entity: Entity, identifier: &str) -> Result<(), EngineError> {
        self.ensure_valid(entity)?;
        let schema = self.registry.resolve(identifier)?;
        let type_id = schema.type_id();
        let stored =
            self.components
                .get(type_id, entity.id)
                .ok_or_else(|| EngineError::ComponentNotFound {
                    component: identifier.to_string(),
                    entity,
                })?;
        if schema.is_builtin() || stored.origin == AttachOrigin::Template {
            return Err(EngineError::NotRemovable {
                component: identifier.to_string(),
                entity,
            });
        }

        self.components.remove(type_id, entity.id);
        if let Some(record) = self.entities.record_mut(entity) {
            record.components.retain(|t| *t != type_id);
        }
        self.queries
            .component_changed(type_id, entity, &self.components);

        trace!(%entity, component = identifier, "detached component");
        Ok(())
    }

    // -- Queries --

    /// Register a query over `base` using the fields `x`, `y` and `z`.
    pub fn register_query(&mut self, base: Option<&str>) -> Result<QueryHandle, EngineError> {
        self.register_query_with_fields(base, DEFAULT_QUERY_FIELDS)
    }

    /// Register a query over `base` ranging on the named fields.
    ///
    /// Without a base component the query tracks every live entity and
    /// ignores all bounds.
    pub fn register_query_with_fields(
        &mut self,
        base: Option<&str>,
        fields: [&str; QUERY_AXES],
    ) -> Result<QueryHandle, EngineError> {
        let schema = base
            .map(|identifier| self.registry.resolve(identifier))
            .transpose()?;
        let definition = QueryDefinition::new(schema, fields);
        let active_axes = definition.active_axes();
        let handle = self
            .queries
            .register(definition, &self.entities, &self.components);

        info!(
            query = handle.0,
            base = base.unwrap_or("<any>"),
            ?fields,
            active_axes,
            "registered query"
        );
        Ok(handle)
    }

    /// Require an additional component for a query's matches.
    pub fn add_query_filter(
        &mut self,
        handle: QueryHandle,
        identifier: &str,
    ) -> Result<(), EngineError> {
        let schema = self.registry.resolve(identifier)?;
        if self
            .queries
            .add_filter(handle, schema.type_id(), &self.components)?
        {
            debug!(query = handle.0, filter = identifier, "added query filter");
        }
        Ok(())
    }

    /// Entities matched by a query within `bounds`, ordered by id.
    pub fn query(
        &self,
        handle: QueryHandle,
        bounds: &QueryBounds,
    ) -> Result<Vec<Entity>, EngineError> {
        self.queries.evaluate(handle, bounds)
    }

    /// The definition behind a query handle.
    #[must_use]
    pub fn query_definition(&self, handle: QueryHandle) -> Option<&QueryDefinition> {
        self.queries.definition(handle)
    }

    /// Recompute every query index from the stores and report any
    /// divergence.
    pub fn verify_indexes(&self) -> Result<(), EngineError> {
        self.queries.verify(&self.entities, &self.components)
    }

    fn ensure_valid(&self, entity: Entity) -> Result<(), EngineError> {
        if self.entities.is_valid(entity) {
            Ok(())
        } else {
            Err(EngineError::EntityNotFound(entity))
        }
    }
}
