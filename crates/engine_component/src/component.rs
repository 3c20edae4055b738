//! Component schemas and instances.
//!
//! A [`ComponentSchema`] is a named, ordered set of fields with default
//! values. The layout is fixed at registration: a [`ComponentInstance`]
//! stores one value per field, in schema order, so field lookups resolve to
//! an index once and never re-hash the schema.
//!
//! ## Type identity
//!
//! [`ComponentTypeId`] is derived from the component's **identifier** using
//! the FNV-1a 64-bit hash, so the same identifier always maps to the same id
//! without consulting the registry.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::entity::Entity;
use crate::error::ComponentError;
use crate::value::FieldValue;

/// A unique identifier for a component schema, derived from its string
/// identifier using FNV-1a 64-bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub u64);

impl ComponentTypeId {
    /// FNV-1a 64-bit offset basis.
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

    /// FNV-1a 64-bit prime.
    const FNV_PRIME: u64 = 0x0100_0000_01b3;

    /// Compute the [`ComponentTypeId`] for an identifier such as
    /// `"minecraft:position"`.
    ///
    /// ```text
    /// hash = 0xcbf29ce484222325
    /// for each byte in name.as_bytes():
    ///     hash = hash XOR byte
    ///     hash = hash * 0x00000100000001b3
    /// ```
    #[must_use]
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = Self::FNV_OFFSET_BASIS;
        let mut i = 0;
        while i < bytes.len() {
            hash ^= bytes[i] as u64;
            hash = hash.wrapping_mul(Self::FNV_PRIME);
            i += 1;
        }
        Self(hash)
    }
}

impl std::fmt::Display for ComponentTypeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Where a schema came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaOrigin {
    /// Shipped with the engine and present from process start.
    BuiltIn,
    /// Registered by script at runtime.
    Custom,
}

/// The field layout of a component.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSchema {
    identifier: String,
    type_id: ComponentTypeId,
    origin: SchemaOrigin,
    fields: IndexMap<String, FieldValue>,
}

impl ComponentSchema {
    /// Build a schema. Identifier validation is the registry's job.
    #[must_use]
    pub fn new(
        identifier: impl Into<String>,
        origin: SchemaOrigin,
        fields: IndexMap<String, FieldValue>,
    ) -> Self {
        let identifier = identifier.into();
        Self {
            type_id: ComponentTypeId::from_name(&identifier),
            identifier,
            origin,
            fields,
        }
    }

    /// Namespaced identifier, e.g. `minecraft:position`.
    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Hash of the identifier.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    /// Whether the schema is built in or custom.
    #[must_use]
    pub fn origin(&self) -> SchemaOrigin {
        self.origin
    }

    /// Whether the schema ships with the engine.
    #[must_use]
    pub fn is_builtin(&self) -> bool {
        self.origin == SchemaOrigin::BuiltIn
    }

    /// Number of fields in the layout.
    #[must_use]
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Iterate over `(name, default)` pairs in layout order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Position of a field in the layout.
    #[must_use]
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.get_index_of(name)
    }

    /// Position of a field whose default is numeric, i.e. one a spatial query
    /// can index on.
    #[must_use]
    pub fn numeric_field_index(&self, name: &str) -> Option<usize> {
        let (index, _, default) = self.fields.get_full(name)?;
        default.as_number().map(|_| index)
    }

    /// A fresh set of values holding the defaults.
    #[must_use]
    pub fn defaults(&self) -> Vec<FieldValue> {
        self.fields.values().cloned().collect()
    }

    /// Check that `value` may be stored in field `index`.
    pub fn check_field(&self, index: usize, value: &FieldValue) -> Result<(), ComponentError> {
        let (name, default) = self.fields.get_index(index).ok_or_else(|| {
            ComponentError::UnknownField {
                component: self.identifier.clone(),
                field: format!("#{index}"),
            }
        })?;
        if default.same_shape(value) {
            Ok(())
        } else {
            Err(ComponentError::SchemaMismatch {
                component: self.identifier.clone(),
                field: name.clone(),
                expected: default.shape(),
                found: value.shape(),
            })
        }
    }

    /// Check a full value set against the layout.
    pub fn check_values(&self, values: &[FieldValue]) -> Result<(), ComponentError> {
        if values.len() != self.fields.len() {
            return Err(ComponentError::InvalidSchema {
                component: self.identifier.clone(),
                message: format!(
                    "expected {} field values, got {}",
                    self.fields.len(),
                    values.len()
                ),
            });
        }
        values
            .iter()
            .enumerate()
            .try_for_each(|(index, value)| self.check_field(index, value))
    }
}

/// A component attached to an entity, as handed out to script code.
///
/// Instances are copies: editing one does nothing until it is committed
/// back through the component store.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentInstance {
    schema: Arc<ComponentSchema>,
    owner: Entity,
    values: Vec<FieldValue>,
}

impl ComponentInstance {
    /// Create an instance from a value set that already matches the schema.
    #[must_use]
    pub fn new(schema: Arc<ComponentSchema>, owner: Entity, values: Vec<FieldValue>) -> Self {
        debug_assert_eq!(schema.field_count(), values.len());
        Self {
            schema,
            owner,
            values,
        }
    }

    /// Identifier of the component type.
    #[must_use]
    pub fn identifier(&self) -> &str {
        self.schema.identifier()
    }

    /// Type id of the component type.
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.schema.type_id()
    }

    /// The schema this instance follows.
    #[must_use]
    pub fn schema(&self) -> &Arc<ComponentSchema> {
        &self.schema
    }

    /// The entity this instance was read from.
    #[must_use]
    pub fn owner(&self) -> Entity {
        self.owner
    }

    /// All values in layout order.
    #[must_use]
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Value of a field, if the schema has it.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.schema.field_index(field).map(|i| &self.values[i])
    }

    /// Value of a numeric field.
    #[must_use]
    pub fn get_number(&self, field: &str) -> Option<f64> {
        self.get(field).and_then(FieldValue::as_number)
    }

    /// Overwrite a field on this copy.
    ///
    /// Only the field name is checked here; shape is enforced when the
    /// instance is committed.
    pub fn set(&mut self, field: &str, value: impl Into<FieldValue>) -> Result<(), ComponentError> {
        let index = self
            .schema
            .field_index(field)
            .ok_or_else(|| ComponentError::UnknownField {
                component: self.schema.identifier().to_string(),
                field: field.to_string(),
            })?;
        self.values[index] = value.into();
        Ok(())
    }

    /// The instance as a JSON object, tagged with its identifier.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let data: serde_json::Map<String, serde_json::Value> = self
            .schema
            .fields()
            .zip(&self.values)
            .map(|((name, _), value)| (name.to_string(), value.to_json()))
            .collect();
        serde_json::json!({
            "__identifier__": self.identifier(),
            "__type__": "component",
            "data": data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityKind;
    use crate::value::Shape;

    fn pos_schema() -> Arc<ComponentSchema> {
        let mut fields = IndexMap::new();
        fields.insert("x".to_string(), FieldValue::from(0.0));
        fields.insert("y".to_string(), FieldValue::from(0.0));
        fields.insert("label".to_string(), FieldValue::from(""));
        Arc::new(ComponentSchema::new("test:pos", SchemaOrigin::Custom, fields))
    }

    #[test]
    fn test_type_id_matches_from_name() {
        let schema = pos_schema();
        assert_eq!(schema.type_id(), ComponentTypeId::from_name("test:pos"));
        assert_ne!(schema.type_id(), ComponentTypeId::from_name("test:vel"));
    }

    #[test]
    fn test_fnv1a_known_vector() {
        assert_eq!(
            ComponentTypeId::from_name(""),
            ComponentTypeId(0xcbf2_9ce4_8422_2325)
        );
    }

    #[test]
    fn test_numeric_field_index() {
        let schema = pos_schema();
        assert_eq!(schema.numeric_field_index("y"), Some(1));
        assert_eq!(schema.numeric_field_index("label"), None);
        assert_eq!(schema.numeric_field_index("z"), None);
    }

    #[test]
    fn test_instance_set_and_get() {
        let owner = Entity::new(1, EntityKind::Entity);
        let mut inst = ComponentInstance::new(pos_schema(), owner, pos_schema().defaults());
        inst.set("x", 5.0).unwrap();
        assert_eq!(inst.get_number("x"), Some(5.0));
        assert!(matches!(
            inst.set("w", 1.0),
            Err(ComponentError::UnknownField { .. })
        ));
    }

    #[test]
    fn test_check_values_reports_mismatch() {
        let schema = pos_schema();
        let mut values = schema.defaults();
        values[0] = FieldValue::from("five");
        let err = schema.check_values(&values).unwrap_err();
        assert_eq!(
            err,
            ComponentError::SchemaMismatch {
                component: "test:pos".into(),
                field: "x".into(),
                expected: Shape::Number,
                found: Shape::Text,
            }
        );
    }

    #[test]
    fn test_instance_json() {
        let owner = Entity::new(3, EntityKind::Entity);
        let inst = ComponentInstance::new(pos_schema(), owner, pos_schema().defaults());
        let json = inst.to_json();
        assert_eq!(json["__identifier__"], "test:pos");
        assert_eq!(json["data"]["label"], "");
    }
}
