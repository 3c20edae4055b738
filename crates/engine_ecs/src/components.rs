//! Component store: the store of record for component field data.
//!
//! Data is grouped into one column per component type; each column maps an
//! entity id to that entity's field values. Lookups are two hash probes.

use std::collections::HashMap;

use engine_component::{ComponentTypeId, FieldValue};

/// How a component came to be attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOrigin {
    /// Attached by script through the component API.
    Script,
    /// Attached while building an entity from a content template.
    Template,
}

/// Field values of one component on one entity, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredComponent {
    pub values: Vec<FieldValue>,
    pub origin: AttachOrigin,
}

/// Per-type columns of component data.
#[derive(Debug, Default)]
pub struct ComponentStore {
    columns: HashMap<ComponentTypeId, HashMap<u64, StoredComponent>>,
}

impl ComponentStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert component data for an entity, replacing any previous data.
    pub fn insert(&mut self, type_id: ComponentTypeId, entity_id: u64, data: StoredComponent) {
        self.columns
            .entry(type_id)
            .or_default()
            .insert(entity_id, data);
    }

    /// The stored values for one entity's component.
    #[must_use]
    pub fn get(&self, type_id: ComponentTypeId, entity_id: u64) -> Option<&StoredComponent> {
        self.columns.get(&type_id)?.get(&entity_id)
    }

    /// Mutable access to one entity's component.
    pub fn get_mut(
        &mut self,
        type_id: ComponentTypeId,
        entity_id: u64,
    ) -> Option<&mut StoredComponent> {
        self.columns.get_mut(&type_id)?.get_mut(&entity_id)
    }

    /// Whether the entity has a component of this type.
    #[must_use]
    pub fn contains(&self, type_id: ComponentTypeId, entity_id: u64) -> bool {
        self.get(type_id, entity_id).is_some()
    }

    /// Remove one entity's component, returning what was stored.
    pub fn remove(&mut self, type_id: ComponentTypeId, entity_id: u64) -> Option<StoredComponent> {
        let column = self.columns.get_mut(&type_id)?;
        let removed = column.remove(&entity_id);
        if column.is_empty() {
            self.columns.remove(&type_id);
        }
        removed
    }

    /// Number of entities that have the given component.
    #[must_use]
    pub fn column_len(&self, type_id: ComponentTypeId) -> usize {
        self.columns.get(&type_id).map_or(0, HashMap::len)
    }

    /// Total number of stored component instances.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.values().map(HashMap::len).sum()
    }

    /// Whether no component is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(x: f64) -> StoredComponent {
        StoredComponent {
            values: vec![FieldValue::Number(x)],
            origin: AttachOrigin::Script,
        }
    }

    #[test]
    fn test_insert_get_remove() {
        let mut store = ComponentStore::new();
        let pos = ComponentTypeId::from_name("test:pos");
        store.insert(pos, 1, stored(1.0));
        store.insert(pos, 2, stored(2.0));
        assert_eq!(store.column_len(pos), 2);
        assert_eq!(store.get(pos, 2).unwrap().values[0], FieldValue::Number(2.0));

        store.get_mut(pos, 1).unwrap().values[0] = FieldValue::Number(9.0);
        assert_eq!(store.get(pos, 1).unwrap().values[0], FieldValue::Number(9.0));

        assert!(store.remove(pos, 1).is_some());
        assert!(!store.contains(pos, 1));
        assert!(store.remove(pos, 2).is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_missing() {
        let mut store = ComponentStore::new();
        assert!(store.remove(ComponentTypeId::from_name("test:pos"), 1).is_none());
    }
}
