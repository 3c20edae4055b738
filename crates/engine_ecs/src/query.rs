//! Query engine: persistent, incrementally maintained range queries.
//!
//! A query is registered once over an optional base component, three field
//! names on that component, and a set of filter components. The engine keeps
//! a [`SpatialIndex`] per query holding every entity that has the base and
//! all filters, positioned at its current field values.
//!
//! Queries live in an arena and are referenced by [`QueryHandle`]. The store
//! tells the engine about every attach, detach, commit, create and destroy;
//! the engine only touches the queries watching the component involved.

use std::collections::HashMap;
use std::sync::Arc;

use engine_component::{ComponentSchema, ComponentTypeId, Entity, FieldValue};

use crate::components::ComponentStore;
use crate::entities::EntityStore;
use crate::error::EngineError;
use crate::spatial::{AxisRange, QUERY_AXES, QueryBounds, SpatialIndex, same_point};

/// Field names used when a query does not name its own.
pub const DEFAULT_QUERY_FIELDS: [&str; QUERY_AXES] = ["x", "y", "z"];

/// A small integer handle into the query arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueryHandle(pub u32);

impl std::fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Query({})", self.0)
    }
}

/// What a query matches and which fields it ranges over.
#[derive(Debug, Clone)]
pub struct QueryDefinition {
    base: Option<Arc<ComponentSchema>>,
    fields: [String; QUERY_AXES],
    filters: Vec<ComponentTypeId>,
    /// Schema field index of each active axis.
    slots: Vec<usize>,
    /// Active axis serving each query axis, if the field exists and is numeric.
    axis_map: [Option<usize>; QUERY_AXES],
}

impl QueryDefinition {
    /// Resolve the field names against the base schema. Fields the schema
    /// lacks (or that are not numeric) are ignored for the whole query.
    #[must_use]
    pub fn new(base: Option<Arc<ComponentSchema>>, fields: [&str; QUERY_AXES]) -> Self {
        let mut slots = Vec::new();
        let mut axis_map = [None; QUERY_AXES];
        if let Some(schema) = &base {
            for (axis, field) in fields.iter().enumerate() {
                if let Some(slot) = schema.numeric_field_index(field) {
                    axis_map[axis] = Some(slots.len());
                    slots.push(slot);
                }
            }
        }
        Self {
            base,
            fields: fields.map(str::to_string),
            filters: Vec::new(),
            slots,
            axis_map,
        }
    }

    /// The base component, if any.
    #[must_use]
    pub fn base(&self) -> Option<&Arc<ComponentSchema>> {
        self.base.as_ref()
    }

    /// Type id of the base component.
    #[must_use]
    pub fn base_type(&self) -> Option<ComponentTypeId> {
        self.base.as_ref().map(|schema| schema.type_id())
    }

    /// Field names of the three axes.
    #[must_use]
    pub fn fields(&self) -> [&str; QUERY_AXES] {
        [&self.fields[0], &self.fields[1], &self.fields[2]]
    }

    /// Required filter components.
    #[must_use]
    pub fn filters(&self) -> &[ComponentTypeId] {
        &self.filters
    }

    /// Whether bounds on `axis` take part in evaluation.
    #[must_use]
    pub fn is_axis_active(&self, axis: usize) -> bool {
        self.axis_map.get(axis).copied().flatten().is_some()
    }

    /// Number of axes backed by a numeric field.
    #[must_use]
    pub fn active_axes(&self) -> usize {
        self.slots.len()
    }

    /// Whether attaching or detaching `type_id` can change membership.
    #[must_use]
    pub fn depends_on(&self, type_id: ComponentTypeId) -> bool {
        self.base_type() == Some(type_id) || self.filters.contains(&type_id)
    }

    /// Where an entity sits in this query's index, or `None` if it does not
    /// belong there.
    fn locate(&self, entity: Entity, components: &ComponentStore) -> Option<Vec<f64>> {
        if !self
            .filters
            .iter()
            .all(|&filter| components.contains(filter, entity.id))
        {
            return None;
        }
        match &self.base {
            None => Some(Vec::new()),
            Some(schema) => {
                let stored = components.get(schema.type_id(), entity.id)?;
                Some(self.project(&stored.values))
            }
        }
    }

    fn project(&self, values: &[FieldValue]) -> Vec<f64> {
        self.slots
            .iter()
            .map(|&slot| values[slot].as_number().map_or(f64::NAN, |v| v + 0.0))
            .collect()
    }

    fn ranges(&self, bounds: &QueryBounds) -> Vec<AxisRange> {
        let mut ranges = vec![AxisRange::default(); self.slots.len()];
        for (axis, active) in self.axis_map.iter().enumerate() {
            if let Some(active) = active {
                ranges[*active] = bounds.get(axis);
            }
        }
        ranges
    }
}

#[derive(Debug)]
struct QuerySlot {
    definition: QueryDefinition,
    index: SpatialIndex,
}

impl QuerySlot {
    fn sync(&mut self, entity: Entity, components: &ComponentStore) {
        match self.definition.locate(entity, components) {
            Some(coords) => {
                self.index.upsert(entity, coords);
            }
            None => {
                self.index.remove(entity.id);
            }
        }
    }
}

/// Arena of registered queries and their indexes.
#[derive(Debug, Default)]
pub struct QueryEngine {
    slots: Vec<QuerySlot>,
    /// Queries to notify when a component is attached, detached or committed.
    watchers: HashMap<ComponentTypeId, Vec<QueryHandle>>,
    /// Queries without a base component; they track every live entity.
    unbased: Vec<QueryHandle>,
}

impl QueryEngine {
    /// An engine with no queries.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query and back-fill its index from the current stores.
    pub fn register(
        &mut self,
        definition: QueryDefinition,
        entities: &EntityStore,
        components: &ComponentStore,
    ) -> QueryHandle {
        let handle = QueryHandle(self.slots.len() as u32);
        match definition.base_type() {
            Some(base) => self.watchers.entry(base).or_default().push(handle),
            None => self.unbased.push(handle),
        }

        let mut slot = QuerySlot {
            index: SpatialIndex::new(definition.active_axes()),
            definition,
        };
        for (entity, _) in entities.iter() {
            slot.sync(entity, components);
        }
        self.slots.push(slot);
        handle
    }

    /// Add a required component. Returns `false` if it was already required.
    pub fn add_filter(
        &mut self,
        handle: QueryHandle,
        type_id: ComponentTypeId,
        components: &ComponentStore,
    ) -> Result<bool, EngineError> {
        let slot = self
            .slots
            .get_mut(handle.0 as usize)
            .ok_or(EngineError::QueryNotFound(handle.0))?;
        if slot.definition.depends_on(type_id) {
            return Ok(false);
        }

        slot.definition.filters.push(type_id);
        slot.index
            .retain(|entity| components.contains(type_id, entity.id));
        self.watchers.entry(type_id).or_default().push(handle);
        Ok(true)
    }

    /// Definition of a registered query.
    #[must_use]
    pub fn definition(&self, handle: QueryHandle) -> Option<&QueryDefinition> {
        self.slots.get(handle.0 as usize).map(|slot| &slot.definition)
    }

    /// Index of a registered query.
    #[must_use]
    pub fn index(&self, handle: QueryHandle) -> Option<&SpatialIndex> {
        self.slots.get(handle.0 as usize).map(|slot| &slot.index)
    }

    /// Number of registered queries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no queries are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entities in the query's index that fall inside `bounds`.
    pub fn evaluate(
        &self,
        handle: QueryHandle,
        bounds: &QueryBounds,
    ) -> Result<Vec<Entity>, EngineError> {
        let slot = self
            .slots
            .get(handle.0 as usize)
            .ok_or(EngineError::QueryNotFound(handle.0))?;
        Ok(slot.index.range(&slot.definition.ranges(bounds)))
    }

    /// Re-check `entity` in every query watching `type_id`.
    pub fn component_changed(
        &mut self,
        type_id: ComponentTypeId,
        entity: Entity,
        components: &ComponentStore,
    ) {
        let Some(handles) = self.watchers.get(&type_id) else {
            return;
        };
        for handle in handles {
            self.slots[handle.0 as usize].sync(entity, components);
        }
    }

    /// Add a new entity to queries that track every entity.
    pub fn entity_created(&mut self, entity: Entity, components: &ComponentStore) {
        for handle in &self.unbased {
            self.slots[handle.0 as usize].sync(entity, components);
        }
    }

    /// Drop a destroyed entity from every index.
    pub fn entity_destroyed(&mut self, entity_id: u64) {
        for slot in &mut self.slots {
            slot.index.remove(entity_id);
        }
    }

    /// Rebuild every index from the stores and compare with the live one.
    pub fn verify(
        &self,
        entities: &EntityStore,
        components: &ComponentStore,
    ) -> Result<(), EngineError> {
        for (position, slot) in self.slots.iter().enumerate() {
            let query = position as u32;
            let corrupt = |detail: String| EngineError::IndexCorruption { query, detail };

            slot.index.check_invariants().map_err(corrupt)?;

            let mut expected = 0usize;
            for (entity, _) in entities.iter() {
                let want = slot.definition.locate(entity, components);
                let have = slot.index.coords(entity.id);
                match (&want, have) {
                    (Some(want), Some(have)) if same_point(want, have) => expected += 1,
                    (None, None) => {}
                    _ => {
                        return Err(corrupt(format!(
                            "{entity} expected at {want:?}, indexed at {have:?}"
                        )));
                    }
                }
            }
            if expected != slot.index.len() {
                return Err(corrupt(format!(
                    "index holds {} entities, stores imply {expected}",
                    slot.index.len()
                )));
            }
        }
        Ok(())
    }
}
