use crate::cache::{CachedFile, FileCache};
use crate::document;
use crate::entry::{scalar_string, Entry, EntryId};
use crate::error::{FlatRecordError, Result};
use crate::hooks::Hooks;
use crate::path_template::{self, PathPattern};
use crate::query::{self, Matchers};
use crate::schema::{ModelDefinition, Storage};
use serde_yaml::{Mapping, Value};
use std::collections::{BTreeMap, HashMap};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// A registered model: its definition, the entries it has loaded or created,
/// and the cache of decoded files.
///
/// Entries are addressed by [`EntryId`]. Loading a file hands out ids; the
/// entries themselves stay owned by the model and are reached through
/// [`get`](Self::get) and [`get_mut`](Self::get_mut).
///
/// The cache assumes this process is the only writer. Nothing locks the
/// files, so changes made by another process are not seen until
/// [`clear_cache`](Self::clear_cache), and concurrent writers overwrite each
/// other.
pub struct Model {
    name: String,
    root: PathBuf,
    definition: Arc<ModelDefinition>,
    pattern: PathPattern,
    cache: FileCache,
    entries: HashMap<EntryId, Entry>,
    next_id: u64,
    hooks: Hooks,
}

impl Model {
    pub(crate) fn new(name: &str, root: &Path, definition: ModelDefinition) -> Result<Self> {
        let pattern = definition.validate(name)?;
        Ok(Model {
            name: name.to_string(),
            root: path_template::absolute(root)?,
            definition: Arc::new(definition),
            pattern,
            cache: FileCache::new(),
            entries: HashMap::new(),
            next_id: 1,
            hooks: Hooks::default(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Absolute root every path of this model is resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn definition(&self) -> &ModelDefinition {
        &self.definition
    }

    pub fn storage(&self) -> Storage {
        self.definition.storage()
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    fn not_found(&self, id: EntryId) -> FlatRecordError {
        FlatRecordError::NotFound {
            model: self.name.clone(),
            id: id.to_string(),
        }
    }

    fn absolute(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    fn allocate(&mut self, entry: Entry) -> EntryId {
        let id = EntryId::from_raw(self.next_id);
        self.next_id += 1;
        self.entries.insert(id, entry);
        id
    }

    // -- Entries --

    /// Create an empty, unbound entry
    pub fn new_entry(&mut self) -> EntryId {
        let entry = Entry::new(Arc::clone(&self.definition));
        self.allocate(entry)
    }

    /// Create an unbound entry from `values`, routing each key to its field
    pub fn create(&mut self, values: Mapping) -> Result<EntryId> {
        let entry = Entry::with_values(Arc::clone(&self.definition), values)?;
        Ok(self.allocate(entry))
    }

    /// Adopt an entry built with [`Entry::new`] for this model's definition.
    pub fn insert(&mut self, entry: Entry) -> Result<EntryId> {
        if !std::ptr::eq(entry.model(), self.definition.as_ref()) {
            return Err(FlatRecordError::Schema(format!(
                "entry belongs to another model than '{}'",
                self.name
            )));
        }
        Ok(self.allocate(entry))
    }

    /// A fresh, unbound entry sharing this model's definition
    pub fn blank(&self) -> Entry {
        Entry::new(Arc::clone(&self.definition))
    }

    pub fn get(&self, id: EntryId) -> Result<&Entry> {
        self.entries.get(&id).ok_or_else(|| self.not_found(id))
    }

    pub fn get_mut(&mut self, id: EntryId) -> Result<&mut Entry> {
        match self.entries.get_mut(&id) {
            Some(entry) => Ok(entry),
            None => Err(FlatRecordError::NotFound {
                model: self.name.clone(),
                id: id.to_string(),
            }),
        }
    }

    // -- Files --

    /// Relative glob for the files that can hold entries matching
    /// `matchers`. Only exact matchers on path-derived fields narrow it.
    pub fn path(&self, matchers: &Matchers) -> String {
        let values: BTreeMap<usize, String> = self
            .definition
            .filepath_bindings()
            .into_iter()
            .filter_map(|(wildcard, name)| {
                let value = matchers.exact(name)?;
                scalar_string(value).map(|value| (wildcard, value))
            })
            .collect();
        let glob = self.pattern.to_glob(&values);
        self.hooks.run_after_path(glob, matchers)
    }

    /// Files on disk that can hold entries matching `matchers`, in
    /// traversal order.
    pub fn files(&self, matchers: &Matchers) -> Result<Vec<PathBuf>> {
        path_template::expand(&self.root, &self.path(matchers))
    }

    /// Values captured from `path` for every path-derived field
    fn filepath_values(&self, path: &Path) -> Mapping {
        let captures = path_template::relative_to(&self.root, path)
            .and_then(|rel| self.pattern.extract(&rel))
            .unwrap_or_default();

        let mut values = Mapping::new();
        for (wildcard, name) in self.definition.filepath_bindings() {
            if let Some(capture) = captures.get(wildcard - 1) {
                values.insert(Value::String(name.to_string()), Value::String(capture.clone()));
            }
        }
        values
    }

    /// Entries decoded from `path`, from the cache when possible.
    pub fn load_file(&mut self, path: &Path) -> Result<Vec<EntryId>> {
        let path = self.absolute(path);
        if let Some(cached) = self.cache.get(&path) {
            return Ok(cached.ids().to_vec());
        }

        self.hooks.run_before_load(&path)?;
        let content = document::read_file(&path)?;
        let filepath_data = self.filepath_values(&path);

        let decoded: Vec<Entry> = match self.storage() {
            Storage::Entry => {
                let decoded =
                    document::decode_entry(&path, &content, self.definition.text_count())?;
                vec![Entry::loaded(
                    Arc::clone(&self.definition),
                    path.clone(),
                    decoded.data,
                    decoded.texts,
                    filepath_data,
                )]
            }
            Storage::List => document::decode_list(&path, &content)?
                .into_iter()
                .map(|data| {
                    Entry::loaded(
                        Arc::clone(&self.definition),
                        path.clone(),
                        data,
                        Vec::new(),
                        filepath_data.clone(),
                    )
                })
                .collect(),
        };

        let loaded = decoded
            .into_iter()
            .map(|entry| self.hooks.run_after_load(entry))
            .collect::<Result<Vec<_>>>()?;
        let ids: Vec<EntryId> = loaded.into_iter().map(|entry| self.allocate(entry)).collect();

        let content = match self.storage() {
            Storage::Entry => match ids.first() {
                Some(id) => CachedFile::Single(*id),
                None => CachedFile::List(Vec::new()),
            },
            Storage::List => CachedFile::List(ids.clone()),
        };
        self.cache.put(path.clone(), content);

        log::debug!("Loaded {} {} entries from {}", ids.len(), self.name, path.display());
        Ok(ids)
    }

    /// Every entry of every file matching `matchers`, file order first, then
    /// order within the file. Non-path matchers are not applied.
    pub fn all_entries(&mut self, matchers: &Matchers) -> Result<Vec<EntryId>> {
        let mut ids = Vec::new();
        for file in self.files(matchers)? {
            ids.extend(self.load_file(&file)?);
        }
        Ok(ids)
    }

    /// Visit matching entries one file at a time. Files after the one where
    /// `visit` breaks are never loaded.
    pub fn each_entry<B, F>(&mut self, matchers: &Matchers, mut visit: F) -> Result<Option<B>>
    where
        F: FnMut(EntryId, &Entry) -> ControlFlow<B>,
    {
        for file in self.files(matchers)? {
            for id in self.load_file(&file)? {
                let Some(entry) = self.entries.get(&id) else {
                    continue;
                };
                if !query::matches(entry, matchers) {
                    continue;
                }
                if let ControlFlow::Break(value) = visit(id, entry) {
                    return Ok(Some(value));
                }
            }
        }
        Ok(None)
    }

    // -- Queries --

    pub fn all(&mut self, matchers: &Matchers) -> Result<Vec<EntryId>> {
        self.all_where(matchers, |_| true)
    }

    /// Every entry matching `matchers` and then `predicate`
    pub fn all_where<P>(&mut self, matchers: &Matchers, predicate: P) -> Result<Vec<EntryId>>
    where
        P: Fn(&Entry) -> bool,
    {
        let mut ids = Vec::new();
        self.each_entry(matchers, |id, entry| {
            if predicate(entry) {
                ids.push(id);
            }
            ControlFlow::<()>::Continue(())
        })?;
        Ok(ids)
    }

    pub fn first(&mut self, matchers: &Matchers) -> Result<Option<EntryId>> {
        self.first_where(matchers, |_| true)
    }

    pub fn first_where<P>(&mut self, matchers: &Matchers, predicate: P) -> Result<Option<EntryId>>
    where
        P: Fn(&Entry) -> bool,
    {
        self.each_entry(matchers, |id, entry| {
            if predicate(entry) {
                ControlFlow::Break(id)
            } else {
                ControlFlow::Continue(())
            }
        })
    }

    // -- Persistence --

    /// Where `entry` is saved: its file, or the pattern rendered with its
    /// path-derived values.
    fn target_path(&self, entry: &Entry) -> Result<PathBuf> {
        if let Some(file) = entry.file() {
            return Ok(self.absolute(file));
        }

        let mut values = BTreeMap::new();
        for (wildcard, name) in self.definition.filepath_bindings() {
            if let Some(value) = entry.get(name)?.as_ref().and_then(scalar_string) {
                values.insert(wildcard, value);
            }
        }
        let rendered = self.pattern.render(&values);
        if !path_template::is_concrete(&rendered) {
            return Err(FlatRecordError::AmbiguousPath {
                model: self.name.clone(),
                path: rendered,
            });
        }
        Ok(self.root.join(rendered))
    }

    /// Write the entry, together with every entry sharing its file. Moves
    /// it first when its file differs from where it is cached. Returns the
    /// absolute path written.
    pub fn save(&mut self, id: EntryId) -> Result<PathBuf> {
        let entry = self.entries.get_mut(&id).ok_or_else(|| FlatRecordError::NotFound {
            model: self.name.clone(),
            id: id.to_string(),
        })?;
        self.hooks.run_before_save(entry)?;

        let target = self.target_path(self.get(id)?)?;
        if self.cache.locate(id) != Some(target.as_path()) {
            self.move_entry(id, &target)?;
        }
        self.save_file(&target)?;

        self.hooks.run_after_save(self.get(id)?)?;
        Ok(target)
    }

    /// Rewrite `path` from the cache
    pub fn save_file(&self, path: &Path) -> Result<()> {
        let path = self.absolute(path);
        let content = match self.cache.get(&path) {
            Some(CachedFile::Single(id)) => {
                let entry = self.get(*id)?;
                document::encode_entry(entry.data(), entry.texts())?
            }
            Some(CachedFile::List(ids)) => {
                let entries = ids
                    .iter()
                    .map(|id| self.get(*id).map(Entry::data))
                    .collect::<Result<Vec<_>>>()?;
                document::encode_list(entries)?
            }
            None => {
                return Err(FlatRecordError::Other(format!(
                    "nothing cached for {} in model '{}'",
                    path.display(),
                    self.name
                )))
            }
        };
        document::write_file(&path, &content)
    }

    /// Delete the entry from disk and from the model. Its id is dead
    /// afterwards.
    pub fn destroy(&mut self, id: EntryId) -> Result<()> {
        self.hooks.run_before_destroy(self.get(id)?)?;
        let entry = self.delete_entry(id)?;
        self.hooks.run_after_destroy(&entry)
    }

    fn delete_entry(&mut self, id: EntryId) -> Result<Entry> {
        if let Some((path, remaining)) = self.cache.detach(id) {
            if remaining == 0 {
                document::delete_file(&path, &self.root)?;
            } else {
                self.save_file(&path)?;
            }
        }
        let entry = self.entries.remove(&id).ok_or_else(|| self.not_found(id))?;
        log::debug!("Destroyed {} entry {}", self.name, id);
        Ok(entry)
    }

    /// Move an entry to `to` in the cache and bind it there.
    ///
    /// The file it leaves is deleted when nothing else lives in it, or
    /// rewritten without it. `to` itself is only written by the following
    /// [`save`](Self::save). A list file already on disk at `to` is loaded
    /// first so its entries are kept.
    pub fn move_entry(&mut self, id: EntryId, to: &Path) -> Result<()> {
        if !self.entries.contains_key(&id) {
            return Err(self.not_found(id));
        }
        let to = self.absolute(to);
        if self.cache.locate(id) == Some(to.as_path()) {
            return Ok(());
        }

        if self.storage() == Storage::List && !self.cache.contains(&to) && to.is_file() {
            self.load_file(&to)?;
        }

        if let Some((from, remaining)) = self.cache.detach(id) {
            if remaining == 0 {
                document::delete_file(&from, &self.root)?;
            } else {
                self.save_file(&from)?;
            }
            log::debug!(
                "Moved {} entry {} from {} to {}",
                self.name,
                id,
                from.display(),
                to.display()
            );
        }

        if let Some(displaced) = self.cache.attach(&to, id, self.storage()) {
            log::warn!(
                "Entry {} of model '{}' replaced {} at {}",
                id,
                self.name,
                displaced,
                to.display()
            );
            self.entries.remove(&displaced);
        }

        let filepath_data = self.filepath_values(&to);
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.bind(to, filepath_data);
        }
        Ok(())
    }

    /// Forget every decoded file. Ids handed out for loaded entries become
    /// invalid; entries never saved are kept.
    pub fn clear_cache(&mut self) {
        for id in self.cache.clear() {
            self.entries.remove(&id);
        }
    }
}
