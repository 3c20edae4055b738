//! Content resolution: the boundary to whatever defines entity templates.
//!
//! Templates are authored outside the runtime (behavior packs, data files,
//! tests). The runtime only needs to ask "which components, with which
//! field overrides, does this template start with?".

use std::collections::HashMap;
use std::path::Path;

use engine_component::FieldValue;
use indexmap::IndexMap;
use serde::Deserialize;

/// One component a template attaches, with field values to apply over the
/// schema defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateComponent {
    pub component: String,
    #[serde(default)]
    pub overrides: IndexMap<String, FieldValue>,
}

impl TemplateComponent {
    /// A template entry attaching `component` with its defaults.
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            overrides: IndexMap::new(),
        }
    }

    /// Override one field of the entry.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.overrides.insert(field.into(), value.into());
        self
    }
}

/// Resolves template identifiers into their initial component lists.
pub trait ContentResolver {
    /// Returns `None` when the template is unknown.
    fn resolve_template(&self, identifier: &str) -> Option<Vec<TemplateComponent>>;
}

/// A resolver that knows no templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContent;

impl ContentResolver for NoContent {
    fn resolve_template(&self, _identifier: &str) -> Option<Vec<TemplateComponent>> {
        None
    }
}

/// Errors that can occur while loading a content document.
#[derive(Debug, thiserror::Error)]
pub enum ContentError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed content document: {0}")]
    Json(#[from] serde_json::Error),
}

/// An in-memory template table.
///
/// Can be built in code or loaded from a JSON document of the form
///
/// ```json
/// { "demo:marker": [ { "component": "minecraft:position", "overrides": { "y": 64 } } ] }
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct StaticContent {
    templates: HashMap<String, Vec<TemplateComponent>>,
}

impl StaticContent {
    /// Content with no templates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a template.
    #[must_use]
    pub fn with_template(
        mut self,
        identifier: impl Into<String>,
        components: Vec<TemplateComponent>,
    ) -> Self {
        self.templates.insert(identifier.into(), components);
        self
    }

    /// Parse a template document.
    pub fn from_json(source: &str) -> Result<Self, ContentError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Read and parse a template document from disk.
    pub fn load_file(path: &Path) -> Result<Self, ContentError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_json(&source)
    }

    /// Number of templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Whether there are no templates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl ContentResolver for StaticContent {
    fn resolve_template(&self, identifier: &str) -> Option<Vec<TemplateComponent>> {
        self.templates.get(identifier).cloned()
    }
}
