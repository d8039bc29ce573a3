//! Before/after hooks around model events.
//!
//! Every stage keeps its listeners sorted by priority: lower numbers run
//! first, listeners with equal priority run in registration order. `before`
//! listeners can veto the event by returning an error. `after_load` and
//! `after_path` thread their result through the chain, each listener
//! receiving what the previous one returned.

use crate::entry::Entry;
use crate::error::Result;
use crate::query::Matchers;
use std::path::Path;

pub type LoadListener = dyn Fn(&Path) -> Result<()>;
pub type EntryFilter = dyn Fn(Entry) -> Result<Entry>;
pub type SaveListener = dyn Fn(&mut Entry) -> Result<()>;
pub type EntryListener = dyn Fn(&Entry) -> Result<()>;
pub type PathFilter = dyn Fn(String, &Matchers) -> String;

pub struct HookList<F: ?Sized> {
    listeners: Vec<(i32, Box<F>)>,
}

impl<F: ?Sized> Default for HookList<F> {
    fn default() -> Self {
        HookList {
            listeners: Vec::new(),
        }
    }
}

impl<F: ?Sized> HookList<F> {
    pub fn add(&mut self, priority: i32, listener: Box<F>) {
        let at = self.listeners.partition_point(|(p, _)| *p <= priority);
        self.listeners.insert(at, (priority, listener));
    }

    pub fn iter(&self) -> impl Iterator<Item = &F> {
        self.listeners.iter().map(|(_, listener)| listener.as_ref())
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

#[derive(Default)]
pub struct Hooks {
    before_load: HookList<LoadListener>,
    after_load: HookList<EntryFilter>,
    before_save: HookList<SaveListener>,
    after_save: HookList<EntryListener>,
    before_destroy: HookList<EntryListener>,
    after_destroy: HookList<EntryListener>,
    after_path: HookList<PathFilter>,
}

impl Hooks {
    /// Runs with the absolute path before a file is read
    pub fn before_load<F>(&mut self, priority: i32, listener: F)
    where
        F: Fn(&Path) -> Result<()> + 'static,
    {
        self.before_load.add(priority, Box::new(listener));
    }

    /// Runs on every freshly decoded entry; the returned entry is cached
    pub fn after_load<F>(&mut self, priority: i32, listener: F)
    where
        F: Fn(Entry) -> Result<Entry> + 'static,
    {
        self.after_load.add(priority, Box::new(listener));
    }

    pub fn before_save<F>(&mut self, priority: i32, listener: F)
    where
        F: Fn(&mut Entry) -> Result<()> + 'static,
    {
        self.before_save.add(priority, Box::new(listener));
    }

    pub fn after_save<F>(&mut self, priority: i32, listener: F)
    where
        F: Fn(&Entry) -> Result<()> + 'static,
    {
        self.after_save.add(priority, Box::new(listener));
    }

    pub fn before_destroy<F>(&mut self, priority: i32, listener: F)
    where
        F: Fn(&Entry) -> Result<()> + 'static,
    {
        self.before_destroy.add(priority, Box::new(listener));
    }

    pub fn after_destroy<F>(&mut self, priority: i32, listener: F)
    where
        F: Fn(&Entry) -> Result<()> + 'static,
    {
        self.after_destroy.add(priority, Box::new(listener));
    }

    /// Rewrites the relative glob used to find a model's files
    pub fn after_path<F>(&mut self, priority: i32, listener: F)
    where
        F: Fn(String, &Matchers) -> String + 'static,
    {
        self.after_path.add(priority, Box::new(listener));
    }

    pub(crate) fn run_before_load(&self, path: &Path) -> Result<()> {
        self.before_load.iter().try_for_each(|listener| listener(path))
    }

    pub(crate) fn run_after_load(&self, entry: Entry) -> Result<Entry> {
        self.after_load
            .iter()
            .try_fold(entry, |entry, listener| listener(entry))
    }

    pub(crate) fn run_before_save(&self, entry: &mut Entry) -> Result<()> {
        self.before_save.iter().try_for_each(|listener| listener(entry))
    }

    pub(crate) fn run_after_save(&self, entry: &Entry) -> Result<()> {
        self.after_save.iter().try_for_each(|listener| listener(entry))
    }

    pub(crate) fn run_before_destroy(&self, entry: &Entry) -> Result<()> {
        self.before_destroy.iter().try_for_each(|listener| listener(entry))
    }

    pub(crate) fn run_after_destroy(&self, entry: &Entry) -> Result<()> {
        self.after_destroy.iter().try_for_each(|listener| listener(entry))
    }

    pub(crate) fn run_after_path(&self, glob: String, matchers: &Matchers) -> String {
        self.after_path
            .iter()
            .fold(glob, |glob, listener| listener(glob, matchers))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FlatRecordError;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_priority_then_registration_order() {
        let mut list: HookList<dyn Fn() -> &'static str> = HookList::default();
        list.add(2, Box::new(|| "late"));
        list.add(1, Box::new(|| "first"));
        list.add(1, Box::new(|| "second"));
        list.add(-1, Box::new(|| "earliest"));
        let order: Vec<&str> = list.iter().map(|f| f()).collect();
        assert_eq!(order, vec!["earliest", "first", "second", "late"]);
    }

    #[test]
    fn test_after_path_threads_result() {
        let mut hooks = Hooks::default();
        hooks.after_path(2, |glob, _| format!("{glob}/b"));
        hooks.after_path(1, |glob, _| format!("{glob}/a"));
        assert_eq!(hooks.run_after_path("x".into(), &Matchers::new()), "x/a/b");
    }

    #[test]
    fn test_before_hook_can_veto() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let mut hooks = Hooks::default();

        let seen = Rc::clone(&calls);
        hooks.before_load(1, move |_| {
            seen.borrow_mut().push("one");
            Err(FlatRecordError::Other("vetoed".into()))
        });
        let seen = Rc::clone(&calls);
        hooks.before_load(2, move |_| {
            seen.borrow_mut().push("two");
            Ok(())
        });

        assert!(hooks.run_before_load(Path::new("a.md")).is_err());
        assert_eq!(*calls.borrow(), vec!["one"]);
    }
}
