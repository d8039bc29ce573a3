mod model;

pub use model::Model;

use crate::error::{FlatRecordError, Result};
use crate::path_template;
use crate::schema::{parse_schema, ModelDefinition};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// The main entry point: a root directory and the models registered on it.
/// Every path a model uses is relative to the root.
///
/// A store assumes it is the only writer of its root. There is no locking
/// between processes: the last write wins and cached entries can go stale.
/// Share it across threads behind a mutex.
pub struct Store {
    root: PathBuf,
    models: HashMap<String, Model>,
}

impl Store {
    /// A store with no models. The root does not have to exist yet; a
    /// relative root is resolved against the current directory when a model
    /// is defined.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Store {
            root: root.into(),
            models: HashMap::new(),
        }
    }

    /// Open a data directory and register every model of its schema.yaml.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let root = path_template::absolute(path.as_ref())?;
        if !root.is_dir() {
            return Err(FlatRecordError::Other(format!(
                "Data directory does not exist: {}",
                root.display()
            )));
        }

        let schema_path = root.join("schema.yaml");
        if !schema_path.exists() {
            return Err(FlatRecordError::Schema(format!(
                "schema.yaml not found in {}",
                root.display()
            )));
        }

        let schema = parse_schema(&schema_path)?;
        let mut store = Store::new(root);
        for (name, definition) in schema.model_definitions()? {
            store.define_model(&name, definition)?;
        }

        log::debug!(
            "Opened store at {} with {} model(s)",
            store.root.display(),
            store.models.len()
        );
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Register a model. Names are unique per store.
    pub fn define_model(&mut self, name: &str, definition: ModelDefinition) -> Result<&mut Model> {
        if self.models.contains_key(name) {
            return Err(FlatRecordError::Schema(format!(
                "model '{name}' is already defined"
            )));
        }
        let model = Model::new(name, &self.root, definition)?;
        Ok(self.models.entry(name.to_string()).or_insert(model))
    }

    pub fn model(&self, name: &str) -> Result<&Model> {
        self.models
            .get(name)
            .ok_or_else(|| FlatRecordError::UnknownModel(name.to_string()))
    }

    pub fn model_mut(&mut self, name: &str) -> Result<&mut Model> {
        self.models
            .get_mut(name)
            .ok_or_else(|| FlatRecordError::UnknownModel(name.to_string()))
    }

    /// Registered model names, sorted
    pub fn model_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Matchers;
    use tempfile::TempDir;

    fn setup_test_store() -> (TempDir, Store) {
        let tmp = TempDir::new().unwrap();
        let schema = r#"
models:
  post:
    path: "data/**/*/post.md"
    fields:
      - title
      - { name: visits, type: integer, default: 0 }
      - { name: summary, kind: text }
      - { name: content, kind: text }
      - { name: category, kind: virtual, in_filepath: 1 }
      - { name: name, kind: virtual, in_filepath: 2 }

  author:
    path: "data/authors/*.yml"
    storage: list
    fields: [login, name]
"#;

        std::fs::write(tmp.path().join("schema.yaml"), schema).unwrap();
        std::fs::create_dir_all(tmp.path().join("data/authors")).unwrap();
        std::fs::write(
            tmp.path().join("data/authors/all.yml"),
            "- login: john\n  name: John Smith\n- login: ivan\n  name: Ivan Ivanov\n",
        )
        .unwrap();

        let store = Store::open(tmp.path()).unwrap();
        (tmp, store)
    }

    #[test]
    fn test_open_store() {
        let (_tmp, store) = setup_test_store();
        assert_eq!(store.model_names(), vec!["author", "post"]);
        assert_eq!(store.model("post").unwrap().definition().text_count(), 2);
    }

    #[test]
    fn test_open_requires_schema() {
        let tmp = TempDir::new().unwrap();
        let err = Store::open(tmp.path()).err().unwrap();
        assert!(matches!(err, FlatRecordError::Schema(_)));

        let err = Store::open(tmp.path().join("missing")).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn test_unknown_model() {
        let (_tmp, store) = setup_test_store();
        assert!(matches!(
            store.model("comment"),
            Err(FlatRecordError::UnknownModel(_))
        ));
    }

    #[test]
    fn test_define_model_twice() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::new(tmp.path());
        store
            .define_model("tag", ModelDefinition::list_in("tags.yml").field("tag"))
            .unwrap();
        let err = store
            .define_model("tag", ModelDefinition::list_in("other.yml"))
            .err()
            .unwrap();
        assert!(err.to_string().contains("already defined"));
    }

    #[test]
    fn test_invalid_definition_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let mut store = Store::new(tmp.path());
        let def = ModelDefinition::list_in("data/*.yml").text("body");
        assert!(matches!(
            store.define_model("note", def),
            Err(FlatRecordError::MissingCapability { .. })
        ));
        assert!(store.model_names().is_empty());
    }

    #[test]
    fn test_models_keep_an_absolute_root() {
        let mut store = Store::new("relative/data");
        let model = store
            .define_model("tag", ModelDefinition::list_in("tags.yml").field("tag"))
            .unwrap();
        assert!(model.root().is_absolute());
        assert!(model.root().ends_with("relative/data"));

        let (_tmp, opened) = setup_test_store();
        assert!(opened.root().is_absolute());
    }

    #[test]
    fn test_models_round_trip_through_store() {
        let (tmp, mut store) = setup_test_store();

        let posts = store.model_mut("post").unwrap();
        let id = posts
            .create(serde_yaml::from_str("category: news/\nname: 7\ntitle: Seven\nvisits: '3'").unwrap())
            .unwrap();
        let path = posts.save(id).unwrap();
        assert_eq!(path, tmp.path().join("data/news/7/post.md"));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "title: Seven\nvisits: 3\n"
        );

        let authors = store.model_mut("author").unwrap();
        let ivan = authors
            .first(&Matchers::new().eq("login", "ivan"))
            .unwrap()
            .unwrap();
        assert_eq!(
            authors.get(ivan).unwrap().get_str("name").unwrap().as_deref(),
            Some("Ivan Ivanov")
        );
    }
}
