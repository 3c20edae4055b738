//! Entity handles and allocation utilities.
//!
//! An [`Entity`] is a lightweight handle: a `u64` identifier plus the kind of
//! world object it was created as. Entities carry no data of their own;
//! components attached to them give them meaning.

use serde::{Deserialize, Serialize};

/// The kind of world object an entity was created as.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A regular world entity (mobs, markers, script-only objects).
    #[default]
    Entity,
    /// An item lying in the world.
    ItemEntity,
}

impl EntityKind {
    /// Returns the identifier used for this kind in script payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Entity => "entity",
            EntityKind::ItemEntity => "item_entity",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A handle to an entity.
///
/// Identifiers are allocated once and never reused for the lifetime of the
/// process, so a handle to a destroyed entity stays invalid forever.
///
/// Handles serialise as `{"__type__": "entity", "id": 7}` so they can be
/// embedded in event payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity {
    /// The unique identifier of the entity in the world.
    pub id: u64,
    /// What kind of object this entity is.
    #[serde(rename = "__type__")]
    pub kind: EntityKind,
}

impl Entity {
    /// Create a handle from a raw identifier and kind.
    #[must_use]
    pub const fn new(id: u64, kind: EntityKind) -> Self {
        Self { id, kind }
    }

    /// Returns the raw `u64` identifier.
    #[must_use]
    pub const fn id(self) -> u64 {
        self.id
    }

    /// Serialise the handle into a JSON value for event payloads.
    #[must_use]
    pub fn to_json(self) -> serde_json::Value {
        serde_json::json!({ "__type__": self.kind.as_str(), "id": self.id })
    }

    /// Serialise the handle together with the identifier of the template it
    /// was built from, as `{"__identifier__": "minecraft:pig", ...}`.
    #[must_use]
    pub fn to_json_with_identifier(self, identifier: Option<&str>) -> serde_json::Value {
        let mut json = self.to_json();
        if let Some(identifier) = identifier {
            json["__identifier__"] = serde_json::Value::from(identifier);
        }
        json
    }

    /// Read a handle back out of an event payload. Extra keys are ignored.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({}, {})", self.id, self.kind)
    }
}

/// Allocates monotonically increasing entity IDs.
///
/// IDs start at 1 and are never recycled.
#[derive(Debug)]
pub struct EntityAllocator {
    next_id: u64,
}

impl EntityAllocator {
    /// Creates a new allocator.
    #[must_use]
    pub fn new() -> Self {
        Self { next_id: 1 }
    }

    /// Allocates a fresh entity handle of the given kind.
    pub fn allocate(&mut self, kind: EntityKind) -> Entity {
        let id = self.next_id;
        self.next_id += 1;
        Entity::new(id, kind)
    }

    /// Returns the number of entities allocated so far.
    #[must_use]
    pub fn count(&self) -> u64 {
        self.next_id - 1
    }
}

impl Default for EntityAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocator_produces_unique_ids() {
        let mut alloc = EntityAllocator::new();
        let e1 = alloc.allocate(EntityKind::Entity);
        let e2 = alloc.allocate(EntityKind::ItemEntity);
        let e3 = alloc.allocate(EntityKind::Entity);
        assert_eq!(e1.id(), 1);
        assert_eq!(e2.id(), 2);
        assert_eq!(e3.id(), 3);
        assert_eq!(e2.kind, EntityKind::ItemEntity);
        assert_eq!(alloc.count(), 3);
    }

    #[test]
    fn test_entity_json_shape() {
        let entity = Entity::new(7, EntityKind::ItemEntity);
        let json = entity.to_json();
        assert_eq!(json["__type__"], "item_entity");
        assert_eq!(json["id"], 7);
        assert_eq!(Entity::from_json(&json), Some(entity));
    }

    #[test]
    fn test_entity_json_with_identifier() {
        let entity = Entity::new(3, EntityKind::Entity);
        let json = entity.to_json_with_identifier(Some("minecraft:pig"));
        assert_eq!(json["__identifier__"], "minecraft:pig");
        assert_eq!(Entity::from_json(&json), Some(entity));
        assert!(entity.to_json_with_identifier(None).get("__identifier__").is_none());
    }

    #[test]
    fn test_entity_from_malformed_json() {
        assert_eq!(Entity::from_json(&serde_json::json!({ "id": "nope" })), None);
        assert_eq!(Entity::from_json(&serde_json::json!(42)), None);
    }
}
