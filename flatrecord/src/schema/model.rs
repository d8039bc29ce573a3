use crate::entry::Entry;
use crate::error::{FlatRecordError, Result};
use crate::path_template::PathPattern;
use super::types::{FieldType, Storage};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Function backing a computed field.
pub type ComputeFn = Arc<dyn Fn(&Entry) -> Option<serde_yaml::Value> + Send + Sync>;

/// Where a field's value lives.
#[derive(Clone)]
pub enum FieldKind {
    /// Key in the structured YAML block
    Field,
    /// Free-text segment, by position after the YAML block
    Text(usize),
    /// Captured from the file path, by 1-based wildcard number
    Filepath(usize),
    /// Derived from the entry on every read, never stored
    Computed(ComputeFn),
}

impl fmt::Debug for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::Field => f.write_str("Field"),
            FieldKind::Text(index) => f.debug_tuple("Text").field(index).finish(),
            FieldKind::Filepath(index) => f.debug_tuple("Filepath").field(index).finish(),
            FieldKind::Computed(_) => f.write_str("Computed"),
        }
    }
}

/// A single declared field of a model
#[derive(Debug, Clone)]
pub struct FieldDefinition {
    pub name: String,
    pub kind: FieldKind,
    pub field_type: Option<FieldType>,
    pub default: Option<serde_yaml::Value>,
}

impl FieldDefinition {
    pub fn structured(name: &str) -> Self {
        Self::with_kind(name, FieldKind::Field)
    }

    pub fn text(name: &str, index: usize) -> Self {
        Self::with_kind(name, FieldKind::Text(index))
    }

    pub fn filepath(name: &str, wildcard: usize) -> Self {
        Self::with_kind(name, FieldKind::Filepath(wildcard))
    }

    pub fn computed<F>(name: &str, compute: F) -> Self
    where
        F: Fn(&Entry) -> Option<serde_yaml::Value> + Send + Sync + 'static,
    {
        Self::with_kind(name, FieldKind::Computed(Arc::new(compute)))
    }

    fn with_kind(name: &str, kind: FieldKind) -> Self {
        FieldDefinition {
            name: name.to_string(),
            kind,
            field_type: None,
            default: None,
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn with_default(mut self, value: impl Into<serde_yaml::Value>) -> Self {
        self.default = Some(value.into());
        self
    }
}

/// Statically declared shape of a model: storage strategy, path pattern and
/// the ordered list of fields.
///
/// ```
/// use flatrecord::ModelDefinition;
///
/// let post = ModelDefinition::entry_in("data/*/post.md")
///     .filepath("name", 1)
///     .field("title")
///     .text("summary")
///     .text("content");
/// assert_eq!(post.text_count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct ModelDefinition {
    storage: Storage,
    path: String,
    fields: Vec<FieldDefinition>,
}

impl ModelDefinition {
    pub fn new(storage: Storage, path: &str) -> Self {
        ModelDefinition {
            storage,
            path: path.to_string(),
            fields: Vec::new(),
        }
    }

    /// Model with one entry per file matching `path`
    pub fn entry_in(path: &str) -> Self {
        Self::new(Storage::Entry, path)
    }

    /// Model with a list of entries in every file matching `path`
    pub fn list_in(path: &str) -> Self {
        Self::new(Storage::List, path)
    }

    pub fn field(self, name: &str) -> Self {
        self.with_field(FieldDefinition::structured(name))
    }

    pub fn text(self, name: &str) -> Self {
        let index = self.text_count();
        self.with_field(FieldDefinition::text(name, index))
    }

    pub fn filepath(self, name: &str, wildcard: usize) -> Self {
        self.with_field(FieldDefinition::filepath(name, wildcard))
    }

    pub fn computed<F>(self, name: &str, compute: F) -> Self
    where
        F: Fn(&Entry) -> Option<serde_yaml::Value> + Send + Sync + 'static,
    {
        self.with_field(FieldDefinition::computed(name, compute))
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn storage(&self) -> Storage {
        self.storage
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field_def(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn text_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Text(_)))
            .count()
    }

    /// Text segment names in file order
    pub fn text_names(&self) -> Vec<&str> {
        let mut texts: Vec<(usize, &str)> = self
            .fields
            .iter()
            .filter_map(|f| match f.kind {
                FieldKind::Text(index) => Some((index, f.name.as_str())),
                _ => None,
            })
            .collect();
        texts.sort_by_key(|(index, _)| *index);
        texts.into_iter().map(|(_, name)| name).collect()
    }

    /// `(wildcard number, field name)` pairs, ordered by wildcard
    pub fn filepath_bindings(&self) -> Vec<(usize, &str)> {
        let mut bindings: Vec<(usize, &str)> = self
            .fields
            .iter()
            .filter_map(|f| match f.kind {
                FieldKind::Filepath(wildcard) => Some((wildcard, f.name.as_str())),
                _ => None,
            })
            .collect();
        bindings.sort_by_key(|(wildcard, _)| *wildcard);
        bindings
    }

    /// Check the definition and parse its path pattern.
    pub fn validate(&self, model: &str) -> Result<PathPattern> {
        let pattern = PathPattern::parse(&self.path)?;

        let mut names = HashSet::new();
        for field in &self.fields {
            if !names.insert(field.name.as_str()) {
                return Err(FlatRecordError::Schema(format!(
                    "model '{model}' declares field '{}' twice",
                    field.name
                )));
            }
        }

        let texts = self.text_names();
        if !texts.is_empty() && self.storage == Storage::List {
            return Err(FlatRecordError::MissingCapability {
                model: model.to_string(),
                capability: "text segments (only entry storage has them)".into(),
            });
        }
        for (position, field) in self
            .fields
            .iter()
            .filter(|f| matches!(f.kind, FieldKind::Text(_)))
            .enumerate()
        {
            if !matches!(field.kind, FieldKind::Text(index) if index == position) {
                return Err(FlatRecordError::Schema(format!(
                    "text '{}' of model '{model}' is out of declaration order",
                    field.name
                )));
            }
        }

        let mut bound = HashSet::new();
        for (wildcard, name) in self.filepath_bindings() {
            if wildcard == 0 || wildcard > pattern.wildcard_count() {
                return Err(FlatRecordError::Schema(format!(
                    "field '{name}' of model '{model}' is bound to wildcard {wildcard}, \
                     but '{}' has {} wildcard(s)",
                    self.path,
                    pattern.wildcard_count()
                )));
            }
            if !bound.insert(wildcard) {
                return Err(FlatRecordError::Schema(format!(
                    "wildcard {wildcard} of model '{model}' is bound twice"
                )));
            }
        }

        Ok(pattern)
    }
}
