//! Entity store: the authoritative table of live entities.
//!
//! Each live entity is a row keyed by its id. The row remembers which
//! components are attached, in attach order, so destroying an entity can
//! cascade to its components without scanning every component column.

use std::collections::HashMap;

use engine_component::{ComponentTypeId, Entity, EntityAllocator, EntityKind};

/// A single live entity's row.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub kind: EntityKind,
    /// Template the entity was built from, if any.
    pub template: Option<String>,
    /// Attached components in attach order.
    pub components: Vec<ComponentTypeId>,
}

/// Owns entity identity and lifetime.
#[derive(Debug, Default)]
pub struct EntityStore {
    allocator: EntityAllocator,
    records: HashMap<u64, EntityRecord>,
}

impl EntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh entity with no components.
    pub fn create(&mut self, kind: EntityKind) -> Entity {
        self.create_from(kind, None)
    }

    /// Allocate a fresh entity, remembering the template it is built from.
    pub fn create_from(&mut self, kind: EntityKind, template: Option<&str>) -> Entity {
        let entity = self.allocator.allocate(kind);
        self.records.insert(
            entity.id,
            EntityRecord {
                kind,
                template: template.map(str::to_string),
                components: Vec::new(),
            },
        );
        entity
    }

    /// Remove an entity's row, returning it if the handle was valid.
    pub fn remove(&mut self, entity: Entity) -> Option<EntityRecord> {
        if !self.is_valid(entity) {
            return None;
        }
        self.records.remove(&entity.id)
    }

    /// Returns `true` if the handle refers to a live entity.
    #[must_use]
    pub fn is_valid(&self, entity: Entity) -> bool {
        self.records
            .get(&entity.id)
            .is_some_and(|record| record.kind == entity.kind)
    }

    /// The live row for a handle, if the handle is valid.
    #[must_use]
    pub fn record(&self, entity: Entity) -> Option<&EntityRecord> {
        self.records
            .get(&entity.id)
            .filter(|record| record.kind == entity.kind)
    }

    /// Mutable access to the live row for a handle.
    pub fn record_mut(&mut self, entity: Entity) -> Option<&mut EntityRecord> {
        self.records
            .get_mut(&entity.id)
            .filter(|record| record.kind == entity.kind)
    }

    /// Iterate over live entities in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &EntityRecord)> {
        self.records
            .iter()
            .map(|(&id, record)| (Entity::new(id, record.kind), record))
    }

    /// Live entities ordered by id.
    #[must_use]
    pub fn handles(&self) -> Vec<Entity> {
        let mut handles: Vec<Entity> = self.iter().map(|(entity, _)| entity).collect();
        handles.sort_unstable_by_key(|e| e.id);
        handles
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no entity is alive.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of ids handed out so far, destroyed entities included.
    #[must_use]
    pub fn allocated(&self) -> u64 {
        self.allocator.count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_remove() {
        let mut store = EntityStore::new();
        let a = store.create(EntityKind::Entity);
        let b = store.create(EntityKind::ItemEntity);
        assert!(store.is_valid(a));
        assert!(store.is_valid(b));
        assert_eq!(store.len(), 2);

        assert!(store.remove(a).is_some());
        assert!(!store.is_valid(a));
        assert!(store.remove(a).is_none());
        assert_eq!(store.handles(), vec![b]);
    }

    #[test]
    fn test_ids_never_reused() {
        let mut store = EntityStore::new();
        let a = store.create(EntityKind::Entity);
        store.remove(a);
        let b = store.create(EntityKind::Entity);
        assert_ne!(a.id, b.id);
        assert!(!store.is_valid(a));
        assert_eq!(store.allocated(), 2);
    }

    #[test]
    fn test_template_is_recorded() {
        let mut store = EntityStore::new();
        let pig = store.create_from(EntityKind::Entity, Some("minecraft:pig"));
        let plain = store.create(EntityKind::Entity);
        assert_eq!(store.record(pig).unwrap().template.as_deref(), Some("minecraft:pig"));
        assert_eq!(store.record(plain).unwrap().template, None);
    }

    #[test]
    fn test_kind_mismatch_is_invalid() {
        let mut store = EntityStore::new();
        let a = store.create(EntityKind::Entity);
        let forged = Entity::new(a.id, EntityKind::ItemEntity);
        assert!(!store.is_valid(forged));
        assert!(store.remove(forged).is_none());
        assert!(store.is_valid(a));
    }
}
