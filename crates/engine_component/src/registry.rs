//! Component registry: the set of schemas known to the runtime.
//!
//! Built-in schemas are present from process start. Script code adds custom
//! schemas with [`ComponentRegistry::register`]; an identifier can only ever
//! be registered once, and registered schemas never change.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::component::{ComponentSchema, ComponentTypeId, SchemaOrigin};
use crate::error::ComponentError;
use crate::value::FieldValue;

/// Identifier of the built-in world position component.
pub const POSITION: &str = "minecraft:position";
/// Identifier of the built-in rotation component.
pub const ROTATION: &str = "minecraft:rotation";
/// Identifier of the built-in health component.
pub const HEALTH: &str = "minecraft:health";
/// Identifier of the built-in name tag component.
pub const NAMEABLE: &str = "minecraft:nameable";
/// Identifier of the built-in collision box component.
pub const COLLISION_BOX: &str = "minecraft:collision_box";
/// Identifier of the built-in scale component.
pub const SCALE: &str = "minecraft:scale";

fn builtin_fields(identifier: &str) -> IndexMap<String, FieldValue> {
    let pairs = match identifier {
        POSITION => vec![
            ("x", FieldValue::Number(0.0)),
            ("y", FieldValue::Number(0.0)),
            ("z", FieldValue::Number(0.0)),
        ],
        ROTATION => vec![("x", FieldValue::Number(0.0)), ("y", FieldValue::Number(0.0))],
        HEALTH => vec![
            ("value", FieldValue::Number(20.0)),
            ("max", FieldValue::Number(20.0)),
        ],
        NAMEABLE => vec![
            ("name", FieldValue::Text(String::new())),
            ("always_show", FieldValue::Bool(false)),
        ],
        COLLISION_BOX => vec![
            ("width", FieldValue::Number(1.0)),
            ("height", FieldValue::Number(1.0)),
        ],
        SCALE => vec![("value", FieldValue::Number(1.0))],
        _ => Vec::new(),
    };
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}

/// Identifiers of every built-in schema.
pub const BUILTIN_COMPONENTS: [&str; 6] =
    [POSITION, ROTATION, HEALTH, NAMEABLE, COLLISION_BOX, SCALE];

/// Returns `true` if `identifier` has the form `namespace:name`.
#[must_use]
pub fn is_namespaced(identifier: &str) -> bool {
    match identifier.split_once(':') {
        Some((ns, name)) => !ns.is_empty() && !name.is_empty() && !name.contains(':'),
        None => false,
    }
}

/// Registry of component schemas keyed by type id.
#[derive(Debug, Default)]
pub struct ComponentRegistry {
    schemas: HashMap<ComponentTypeId, Arc<ComponentSchema>>,
}

impl ComponentRegistry {
    /// Create an empty registry with no built-ins.
    #[must_use]
    pub fn new() -> Self {
        Self {
            schemas: HashMap::new(),
        }
    }

    /// Create a registry pre-populated with the built-in schemas.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for identifier in BUILTIN_COMPONENTS {
            let schema =
                ComponentSchema::new(identifier, SchemaOrigin::BuiltIn, builtin_fields(identifier));
            registry.schemas.insert(schema.type_id(), Arc::new(schema));
        }
        registry
    }

    /// Register a custom schema.
    pub fn register(
        &mut self,
        identifier: &str,
        fields: IndexMap<String, FieldValue>,
    ) -> Result<Arc<ComponentSchema>, ComponentError> {
        if !is_namespaced(identifier) {
            return Err(ComponentError::InvalidIdentifier(identifier.to_string()));
        }
        let type_id = ComponentTypeId::from_name(identifier);
        if self.schemas.contains_key(&type_id) {
            return Err(ComponentError::DuplicateIdentifier(identifier.to_string()));
        }

        let schema = Arc::new(ComponentSchema::new(identifier, SchemaOrigin::Custom, fields));
        self.schemas.insert(type_id, Arc::clone(&schema));
        debug!(
            component = identifier,
            fields = schema.field_count(),
            "registered component schema"
        );
        Ok(schema)
    }

    /// Register a custom schema from a JSON object of field defaults, e.g.
    /// `{"x": 0, "y": 0, "z": 0}`.
    pub fn register_json(
        &mut self,
        identifier: &str,
        data: &serde_json::Value,
    ) -> Result<Arc<ComponentSchema>, ComponentError> {
        let object = data
            .as_object()
            .ok_or_else(|| ComponentError::InvalidSchema {
                component: identifier.to_string(),
                message: "component data must be an object".to_string(),
            })?;
        let fields = object
            .iter()
            .map(|(name, value)| Ok((name.clone(), FieldValue::from_json(value, identifier)?)))
            .collect::<Result<IndexMap<_, _>, ComponentError>>()?;
        self.register(identifier, fields)
    }

    /// Look up a schema by identifier.
    pub fn resolve(&self, identifier: &str) -> Result<Arc<ComponentSchema>, ComponentError> {
        self.schemas
            .get(&ComponentTypeId::from_name(identifier))
            .filter(|schema| schema.identifier() == identifier)
            .cloned()
            .ok_or_else(|| ComponentError::UnknownComponent(identifier.to_string()))
    }

    /// Look up a schema by type id.
    #[must_use]
    pub fn get(&self, type_id: ComponentTypeId) -> Option<&Arc<ComponentSchema>> {
        self.schemas.get(&type_id)
    }

    /// Whether a schema is registered under `identifier`.
    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.resolve(identifier).is_ok()
    }

    /// Number of registered schemas, built-ins included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether no schemas are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// All registered identifiers, sorted.
    #[must_use]
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.schemas.values().map(|s| s.identifier()).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtins_present() {
        let registry = ComponentRegistry::with_builtins();
        assert_eq!(registry.len(), BUILTIN_COMPONENTS.len());
        let position = registry.resolve(POSITION).unwrap();
        assert!(position.is_builtin());
        assert_eq!(position.numeric_field_index("z"), Some(2));
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = ComponentRegistry::new();
        let schema = registry
            .register_json("test:pos", &json!({ "x": 0, "y": 0, "z": 0 }))
            .unwrap();
        assert!(!schema.is_builtin());
        assert_eq!(registry.resolve("test:pos").unwrap(), schema);
        assert_eq!(schema.fields().map(|(n, _)| n).collect::<Vec<_>>(), ["x", "y", "z"]);
    }

    #[test]
    fn test_register_twice_is_duplicate() {
        let mut registry = ComponentRegistry::new();
        registry.register_json("test:pos", &json!({ "x": 0 })).unwrap();
        let err = registry.register_json("test:pos", &json!({ "y": 1 })).unwrap_err();
        assert_eq!(err, ComponentError::DuplicateIdentifier("test:pos".into()));
        // The first definition is untouched.
        assert!(registry.resolve("test:pos").unwrap().field_index("x").is_some());
    }

    #[test]
    fn test_cannot_shadow_builtin() {
        let mut registry = ComponentRegistry::with_builtins();
        let err = registry.register(POSITION, IndexMap::new()).unwrap_err();
        assert_eq!(err, ComponentError::DuplicateIdentifier(POSITION.into()));
    }

    #[test]
    fn test_identifier_requires_namespace() {
        let mut registry = ComponentRegistry::new();
        for bad in ["pos", ":pos", "test:", "a:b:c"] {
            assert_eq!(
                registry.register(bad, IndexMap::new()).unwrap_err(),
                ComponentError::InvalidIdentifier(bad.into())
            );
        }
    }

    #[test]
    fn test_register_json_requires_object() {
        let mut registry = ComponentRegistry::new();
        assert!(matches!(
            registry.register_json("test:pos", &json!([1, 2])),
            Err(ComponentError::InvalidSchema { .. })
        ));
        assert!(!registry.contains("test:pos"));
    }

    #[test]
    fn test_resolve_unknown() {
        let registry = ComponentRegistry::with_builtins();
        assert_eq!(
            registry.resolve("test:nope").unwrap_err(),
            ComponentError::UnknownComponent("test:nope".into())
        );
    }
}
