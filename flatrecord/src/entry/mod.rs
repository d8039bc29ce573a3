// Entries - one logical record and field access through the model schema

mod coerce;

pub(crate) use coerce::scalar_string;

use crate::error::{FlatRecordError, Result};
use crate::schema::{FieldKind, ModelDefinition};
use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Handle of an entry inside a [`Model`](crate::store::Model).
/// Stable for the entry's lifetime, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(u64);

impl EntryId {
    pub fn from_raw(raw: u64) -> Self {
        EntryId(raw)
    }

    pub fn as_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One record: structured YAML fields, text segments and the values
/// captured from its file path.
#[derive(Debug, Clone)]
pub struct Entry {
    model: Arc<ModelDefinition>,
    file: Option<PathBuf>,
    data: Mapping,
    texts: Vec<Option<String>>,
    filepath_data: Mapping,
}

fn key(name: &str) -> Value {
    Value::String(name.to_string())
}

impl Entry {
    /// An empty, unbound entry
    pub fn new(model: Arc<ModelDefinition>) -> Self {
        let texts = vec![None; model.text_count()];
        Entry {
            model,
            file: None,
            data: Mapping::new(),
            texts,
            filepath_data: Mapping::new(),
        }
    }

    /// An unbound entry with every value in `values` routed to the
    /// structured block, its text segment or its path-derived slot.
    pub fn with_values(model: Arc<ModelDefinition>, values: Mapping) -> Result<Self> {
        let mut entry = Self::new(model);
        for (name, value) in values {
            let name = scalar_string(&name).ok_or_else(|| {
                FlatRecordError::Other("field names must be scalars".into())
            })?;
            entry.set(&name, value)?;
        }
        Ok(entry)
    }

    pub(crate) fn loaded(
        model: Arc<ModelDefinition>,
        file: PathBuf,
        data: Mapping,
        texts: Vec<Option<String>>,
        filepath_data: Mapping,
    ) -> Self {
        Entry {
            model,
            file: Some(file),
            data,
            texts,
            filepath_data,
        }
    }

    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }

    /// File this entry is saved to, `None` while unbound
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    /// Point the entry at another file. A relative path is resolved against
    /// the store root on the next save, which also moves the entry there.
    pub fn set_file(&mut self, file: impl Into<PathBuf>) {
        self.file = Some(file.into());
    }

    pub fn is_bound(&self) -> bool {
        self.file.is_some()
    }

    /// Bind to `file` with the values captured from it. A path outside the
    /// pattern captures nothing and clears the previous values.
    pub(crate) fn bind(&mut self, file: PathBuf, filepath_data: Mapping) {
        self.file = Some(file);
        self.filepath_data = filepath_data;
    }

    /// The structured YAML block, in file order
    pub fn data(&self) -> &Mapping {
        &self.data
    }

    pub fn texts(&self) -> &[Option<String>] {
        &self.texts
    }

    /// Values captured from the file path (or assigned before the first save)
    pub fn filepath_data(&self) -> &Mapping {
        &self.filepath_data
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.model.field_def(name)?.kind {
            FieldKind::Text(index) => self.texts.get(index)?.as_deref(),
            _ => None,
        }
    }

    /// Stored value of `name` with no type conversion or default.
    ///
    /// Computed and path-derived fields win over the structured block;
    /// undeclared names fall back to the structured block so extra keys in
    /// a file stay reachable.
    pub fn raw(&self, name: &str) -> Option<Value> {
        let Some(field) = self.model.field_def(name) else {
            return self.data.get(key(name)).cloned();
        };
        match &field.kind {
            FieldKind::Computed(compute) => compute(self),
            FieldKind::Filepath(_) => self.filepath_data.get(key(name)).cloned(),
            FieldKind::Text(index) => self
                .texts
                .get(*index)
                .cloned()
                .flatten()
                .map(Value::String),
            FieldKind::Field => self.data.get(key(name)).cloned(),
        }
    }

    /// Value of `name` converted to the declared type, or the declared
    /// default when nothing (or null) is stored.
    pub fn get(&self, name: &str) -> Result<Option<Value>> {
        let value = self.raw(name).filter(|v| !v.is_null());
        let Some(field) = self.model.field_def(name) else {
            return Ok(value);
        };

        match value {
            Some(value) => match field.field_type {
                Some(field_type) => coerce::coerce(name, field_type, value).map(Some),
                None => Ok(Some(value)),
            },
            None => Ok(field.default.clone()),
        }
    }

    /// Value used by query matching: converted when possible, raw otherwise.
    pub(crate) fn resolve(&self, name: &str) -> Option<Value> {
        self.get(name).unwrap_or_else(|_| self.raw(name))
    }

    pub fn get_str(&self, name: &str) -> Result<Option<String>> {
        Ok(self.get(name)?.as_ref().and_then(scalar_string))
    }

    pub fn date(&self, name: &str) -> Result<Option<NaiveDate>> {
        self.get(name)?
            .map(|value| coerce::parse_date(name, &value))
            .transpose()
    }

    pub fn time(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        self.get(name)?
            .map(|value| coerce::parse_time(name, &value))
            .transpose()
    }

    /// Assign `name`, converting to the declared type first.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let Some(field) = self.model.field_def(name) else {
            self.data.insert(key(name), value);
            return Ok(());
        };

        let value = match field.field_type {
            Some(field_type) => coerce::coerce(name, field_type, value)?,
            None => value,
        };

        match field.kind {
            FieldKind::Field => {
                self.data.insert(key(name), value);
            }
            FieldKind::Filepath(_) => {
                self.filepath_data.insert(key(name), value);
            }
            FieldKind::Text(index) => {
                let text = match &value {
                    Value::Null => None,
                    Value::Mapping(_) | Value::Sequence(_) => {
                        return Err(FlatRecordError::Coercion {
                            field: name.to_string(),
                            message: "text segments hold plain text".into(),
                        });
                    }
                    other => scalar_string(other),
                };
                if self.texts.len() <= index {
                    self.texts.resize(index + 1, None);
                }
                self.texts[index] = text;
            }
            FieldKind::Computed(_) => {
                return Err(FlatRecordError::Schema(format!(
                    "field '{name}' is computed and cannot be assigned"
                )));
            }
        }
        Ok(())
    }

    pub fn set_date(&mut self, name: &str, date: NaiveDate) -> Result<()> {
        self.set(name, date.format(coerce::DATE_FORMAT).to_string())
    }

    pub fn set_time(&mut self, name: &str, time: DateTime<Utc>) -> Result<()> {
        self.set(name, time.format(coerce::TIME_FORMAT).to_string())
    }

    /// Deserialize the whole entry into a typed struct. Declared fields are
    /// read through [`get`](Self::get), so types and defaults apply;
    /// undeclared keys of the structured block are passed through as stored.
    pub fn deserialize<T: DeserializeOwned>(&self) -> Result<T> {
        let mut merged = self.data.clone();
        for field in self.model.fields() {
            if let Some(value) = self.get(&field.name)? {
                merged.insert(key(&field.name), value);
            }
        }
        Ok(serde_yaml::from_value(Value::Mapping(merged))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefinition, FieldType};
    use serde::Deserialize;

    fn post_model() -> Arc<ModelDefinition> {
        Arc::new(
            ModelDefinition::entry_in("data/**/*/post.md")
                .filepath("category", 1)
                .filepath("name", 2)
                .field("title")
                .with_field(FieldDefinition::structured("visits").with_type(FieldType::Integer))
                .with_field(FieldDefinition::structured("tag").with_default("uncategorized"))
                .text("summary")
                .text("content")
                .computed("slug", |entry| {
                    entry
                        .raw("title")
                        .and_then(|t| scalar_string(&t))
                        .map(|t| Value::String(t.to_lowercase()))
                }),
        )
    }

    #[test]
    fn test_new_entry_is_unbound() {
        let entry = Entry::new(post_model());
        assert!(!entry.is_bound());
        assert_eq!(entry.texts(), &[None, None]);
        assert_eq!(entry.get("title").unwrap(), None);
    }

    #[test]
    fn test_set_routes_by_kind() {
        let mut entry = Entry::new(post_model());
        entry.set("title", "Hello").unwrap();
        entry.set("name", 5).unwrap();
        entry.set("content", "Body").unwrap();

        assert_eq!(entry.data().len(), 1);
        assert_eq!(entry.filepath_data().get(key("name")), Some(&Value::from(5)));
        assert_eq!(entry.text("content"), Some("Body"));
        assert_eq!(entry.text("summary"), None);
        assert_eq!(entry.get("category").unwrap(), None);
    }

    #[test]
    fn test_with_values() {
        let values: Mapping = serde_yaml::from_str("name: 5\ncategory: ''\ntitle: Five").unwrap();
        let entry = Entry::with_values(post_model(), values).unwrap();
        assert_eq!(entry.data().len(), 1);
        assert_eq!(entry.filepath_data().len(), 2);
    }

    #[test]
    fn test_typed_field_read_and_write() {
        let mut entry = Entry::new(post_model());
        entry.data.insert(key("visits"), Value::from("1"));
        assert_eq!(entry.get("visits").unwrap(), Some(Value::from(1)));

        entry.set("visits", "2").unwrap();
        assert_eq!(entry.data().get(key("visits")), Some(&Value::from(2)));

        entry.set("visits", Value::Null).unwrap();
        assert_eq!(entry.data().get(key("visits")), Some(&Value::Null));
        assert!(entry.set("visits", "many").is_err());
    }

    #[test]
    fn test_default_value() {
        let mut entry = Entry::new(post_model());
        assert_eq!(entry.get("tag").unwrap(), Some(Value::from("uncategorized")));
        entry.set("tag", "a").unwrap();
        assert_eq!(entry.get("tag").unwrap(), Some(Value::from("a")));
        assert!(!Entry::new(post_model()).data().contains_key(key("tag")));
    }

    #[test]
    fn test_computed_field() {
        let mut entry = Entry::new(post_model());
        entry.set("title", "Hello World").unwrap();
        assert_eq!(entry.get("slug").unwrap(), Some(Value::from("hello world")));
        assert!(entry.set("slug", "x").is_err());
    }

    #[test]
    fn test_undeclared_keys_are_reachable() {
        let mut entry = Entry::new(post_model());
        entry.set("extra", true).unwrap();
        assert_eq!(entry.get("extra").unwrap(), Some(Value::from(true)));
    }

    #[test]
    fn test_dates_and_times() {
        let model = Arc::new(
            ModelDefinition::entry_in("*.md")
                .with_field(FieldDefinition::structured("created").with_type(FieldType::Date))
                .with_field(FieldDefinition::structured("updated").with_type(FieldType::Time)),
        );
        let mut entry = Entry::new(model);
        let date = NaiveDate::from_ymd_opt(1970, 1, 2).unwrap();
        entry.set_date("created", date).unwrap();
        assert_eq!(entry.date("created").unwrap(), Some(date));
        assert_eq!(entry.data().get(key("created")), Some(&Value::from("1970-01-02")));

        entry.set("updated", "1970-01-01 00:00:01 UTC").unwrap();
        let time = entry.time("updated").unwrap().unwrap();
        assert_eq!(time.timestamp(), 1);
        assert_eq!(entry.time("missing").unwrap(), None);
    }

    #[test]
    fn test_deserialize_merges_all_kinds() {
        #[derive(Debug, Deserialize)]
        struct Post {
            title: String,
            name: String,
            summary: Option<String>,
            tag: String,
        }

        let values: Mapping =
            serde_yaml::from_str("name: '4'\ntitle: Best\nsummary: short").unwrap();
        let entry = Entry::with_values(post_model(), values).unwrap();
        let post: Post = entry.deserialize().unwrap();
        assert_eq!(post.title, "Best");
        assert_eq!(post.name, "4");
        assert_eq!(post.summary.as_deref(), Some("short"));
        assert_eq!(post.tag, "uncategorized");
    }
}
