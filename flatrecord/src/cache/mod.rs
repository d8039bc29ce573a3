use crate::entry::EntryId;
use crate::schema::Storage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Entries decoded from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedFile {
    Single(EntryId),
    List(Vec<EntryId>),
}

impl CachedFile {
    pub fn ids(&self) -> &[EntryId] {
        match self {
            CachedFile::Single(id) => std::slice::from_ref(id),
            CachedFile::List(ids) => ids,
        }
    }

    pub fn len(&self) -> usize {
        self.ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids().is_empty()
    }
}

/// Per-model map from absolute file path to the entries decoded from it,
/// plus the reverse index from entry to the file it currently belongs to.
///
/// Pure bookkeeping: nothing here touches the disk.
#[derive(Debug, Default)]
pub struct FileCache {
    files: HashMap<PathBuf, CachedFile>,
    owners: HashMap<EntryId, PathBuf>,
}

impl FileCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &Path) -> Option<&CachedFile> {
        self.files.get(path)
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Store `content` for `path`, replacing whatever was cached there.
    pub fn put(&mut self, path: PathBuf, content: CachedFile) {
        self.invalidate(&path);
        for id in content.ids() {
            if let Some(previous) = self.owners.insert(*id, path.clone()) {
                self.remove_from(&previous, *id);
            }
        }
        self.files.insert(path, content);
    }

    /// Drop the cached content of `path`, returning it.
    pub fn invalidate(&mut self, path: &Path) -> Option<CachedFile> {
        let content = self.files.remove(path)?;
        for id in content.ids() {
            self.owners.remove(id);
        }
        Some(content)
    }

    /// Move cached content from `old` to `new` without touching the disk.
    /// Returns false if nothing was cached for `old`.
    pub fn rename(&mut self, old: &Path, new: PathBuf) -> bool {
        match self.invalidate(old) {
            Some(content) => {
                self.put(new, content);
                true
            }
            None => false,
        }
    }

    /// The file an entry is cached under
    pub fn locate(&self, id: EntryId) -> Option<&Path> {
        self.owners.get(&id).map(PathBuf::as_path)
    }

    /// Record `id` as living in `path`: appended for list storage, replacing
    /// the previous occupant for entry storage. Returns a displaced entry.
    pub fn attach(&mut self, path: &Path, id: EntryId, storage: Storage) -> Option<EntryId> {
        self.detach(id);

        let displaced = match (storage, self.files.get_mut(path)) {
            (Storage::List, Some(CachedFile::List(ids))) => {
                ids.push(id);
                None
            }
            (Storage::List, _) => {
                let previous = self.invalidate(path);
                self.files.insert(path.to_path_buf(), CachedFile::List(vec![id]));
                previous.and_then(|c| c.ids().first().copied())
            }
            (Storage::Entry, _) => {
                let previous = self.invalidate(path);
                self.files.insert(path.to_path_buf(), CachedFile::Single(id));
                previous.and_then(|c| c.ids().first().copied())
            }
        };

        self.owners.insert(id, path.to_path_buf());
        displaced
    }

    /// Remove `id` from the file it is cached under. Returns that file and
    /// how many entries remain there; a file left empty is dropped.
    pub fn detach(&mut self, id: EntryId) -> Option<(PathBuf, usize)> {
        let path = self.owners.remove(&id)?;
        let remaining = self.remove_from(&path, id);
        Some((path, remaining))
    }

    fn remove_from(&mut self, path: &Path, id: EntryId) -> usize {
        let remaining = match self.files.get_mut(path) {
            Some(CachedFile::List(ids)) => {
                ids.retain(|other| *other != id);
                ids.len()
            }
            Some(CachedFile::Single(single)) if *single == id => 0,
            Some(CachedFile::Single(_)) => 1,
            None => 0,
        };
        if remaining == 0 {
            self.files.remove(path);
        }
        remaining
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Forget everything, returning the entries that were cached.
    pub fn clear(&mut self) -> Vec<EntryId> {
        self.files.clear();
        self.owners.drain().map(|(id, _)| id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> EntryId {
        EntryId::from_raw(n)
    }

    #[test]
    fn test_put_get_invalidate() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/r/a.yml");
        assert!(cache.get(&path).is_none());

        cache.put(path.clone(), CachedFile::List(vec![id(1), id(2)]));
        assert_eq!(cache.get(&path).unwrap().len(), 2);
        assert_eq!(cache.locate(id(2)), Some(path.as_path()));

        assert!(cache.invalidate(&path).is_some());
        assert!(cache.get(&path).is_none());
        assert_eq!(cache.locate(id(1)), None);
    }

    #[test]
    fn test_put_replaces_previous_representation() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/r/1/post.md");
        cache.put(path.clone(), CachedFile::Single(id(1)));
        cache.put(path.clone(), CachedFile::Single(id(2)));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.locate(id(1)), None);
        assert_eq!(cache.get(&path), Some(&CachedFile::Single(id(2))));
    }

    #[test]
    fn test_rename_keeps_content() {
        let mut cache = FileCache::new();
        let old = PathBuf::from("/r/old.yml");
        let new = PathBuf::from("/r/new.yml");
        cache.put(old.clone(), CachedFile::List(vec![id(1)]));

        assert!(cache.rename(&old, new.clone()));
        assert!(cache.get(&old).is_none());
        assert_eq!(cache.get(&new), Some(&CachedFile::List(vec![id(1)])));
        assert_eq!(cache.locate(id(1)), Some(new.as_path()));
        assert!(!cache.rename(&old, new));
    }

    #[test]
    fn test_attach_and_detach_list() {
        let mut cache = FileCache::new();
        let a = PathBuf::from("/r/a.yml");
        let b = PathBuf::from("/r/b.yml");
        cache.put(a.clone(), CachedFile::List(vec![id(1), id(2)]));

        assert_eq!(cache.attach(&b, id(1), Storage::List), None);
        assert_eq!(cache.get(&a), Some(&CachedFile::List(vec![id(2)])));
        assert_eq!(cache.get(&b), Some(&CachedFile::List(vec![id(1)])));

        cache.attach(&b, id(2), Storage::List);
        assert!(cache.get(&a).is_none(), "emptied file is dropped");
        assert_eq!(cache.get(&b), Some(&CachedFile::List(vec![id(1), id(2)])));

        assert_eq!(cache.detach(id(1)), Some((b.clone(), 1)));
        assert_eq!(cache.detach(id(1)), None);
    }

    #[test]
    fn test_attach_entry_displaces_occupant() {
        let mut cache = FileCache::new();
        let path = PathBuf::from("/r/1/post.md");
        cache.put(path.clone(), CachedFile::Single(id(1)));
        assert_eq!(cache.attach(&path, id(2), Storage::Entry), Some(id(1)));
        assert_eq!(cache.locate(id(1)), None);
        assert_eq!(cache.locate(id(2)), Some(path.as_path()));
    }

    #[test]
    fn test_clear() {
        let mut cache = FileCache::new();
        cache.put(PathBuf::from("/r/a"), CachedFile::Single(id(1)));
        cache.put(PathBuf::from("/r/b"), CachedFile::List(vec![id(2), id(3)]));
        let mut ids = cache.clear();
        ids.sort();
        assert_eq!(ids, vec![id(1), id(2), id(3)]);
        assert!(cache.is_empty());
    }
}
