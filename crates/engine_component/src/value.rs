//! Dynamically typed component field values.
//!
//! Script components are plain data records whose layout is only known at
//! runtime. Each field holds a [`FieldValue`]; the variant of the default
//! value declared at registration fixes the field's [`Shape`] for the rest of
//! the process.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::ComponentError;

/// A single field value stored in a component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Number(f64),
    Text(String),
    List(Vec<FieldValue>),
    Record(IndexMap<String, FieldValue>),
}

/// The structural kind of a [`FieldValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Shape {
    Bool,
    Number,
    Text,
    List,
    Record,
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Shape::Bool => "bool",
            Shape::Number => "number",
            Shape::Text => "string",
            Shape::List => "list",
            Shape::Record => "record",
        })
    }
}

impl FieldValue {
    /// Returns the shape of this value.
    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            FieldValue::Bool(_) => Shape::Bool,
            FieldValue::Number(_) => Shape::Number,
            FieldValue::Text(_) => Shape::Text,
            FieldValue::List(_) => Shape::List,
            FieldValue::Record(_) => Shape::Record,
        }
    }

    /// Returns `true` if `other` could replace `self` without changing the
    /// field layout.
    ///
    /// Nested records must keep the same keys, in any order, with matching
    /// shapes. Lists only need to stay lists.
    #[must_use]
    pub fn same_shape(&self, other: &FieldValue) -> bool {
        match (self, other) {
            (FieldValue::Record(a), FieldValue::Record(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .all(|(key, value)| b.get(key).is_some_and(|v| value.same_shape(v)))
            }
            _ => self.shape() == other.shape(),
        }
    }

    /// Returns the numeric value, if this is a number.
    #[must_use]
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The text, if this is text.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Convert a JSON value into a field value.
    ///
    /// `null` has no shape and is rejected; `context` names the component in
    /// the error.
    pub fn from_json(value: &serde_json::Value, context: &str) -> Result<Self, ComponentError> {
        use serde_json::Value;

        match value {
            Value::Null => Err(ComponentError::InvalidSchema {
                component: context.to_string(),
                message: "null is not a valid field value".to_string(),
            }),
            Value::Bool(b) => Ok(FieldValue::Bool(*b)),
            Value::Number(n) => n.as_f64().map(FieldValue::Number).ok_or_else(|| {
                ComponentError::InvalidSchema {
                    component: context.to_string(),
                    message: format!("number {n} is not representable as f64"),
                }
            }),
            Value::String(s) => Ok(FieldValue::Text(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(|item| FieldValue::from_json(item, context))
                .collect::<Result<Vec<_>, _>>()
                .map(FieldValue::List),
            Value::Object(map) => map
                .iter()
                .map(|(key, item)| Ok((key.clone(), FieldValue::from_json(item, context)?)))
                .collect::<Result<IndexMap<_, _>, ComponentError>>()
                .map(FieldValue::Record),
        }
    }

    /// Convert this value into JSON. Non-finite numbers become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        FieldValue::Number(f64::from(value))
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Number(f64::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}
