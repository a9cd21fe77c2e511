//! Write-back cache
//!
//! Owns the decoded values of a writeback-mode shelf until they are flushed.
//! Callers mutate values in place through `&mut T` borrowed from here; handing
//! out copies instead would silently drop those mutations at flush time.

use std::collections::btree_map::{self, BTreeMap};

/// Key → value map of entries pending a flush
///
/// Ordered by key, which is also the order entries are flushed in.
#[derive(Debug)]
pub struct WriteBackCache<T> {
    entries: BTreeMap<String, T>,
}

impl<T> WriteBackCache<T> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut T> {
        self.entries.get_mut(key)
    }

    /// Insert or replace, returning the cached slot
    pub fn insert(&mut self, key: &str, value: T) -> &mut T {
        match self.entries.entry(key.to_string()) {
            btree_map::Entry::Occupied(mut slot) => {
                slot.insert(value);
                slot.into_mut()
            }
            btree_map::Entry::Vacant(slot) => slot.insert(value),
        }
    }

    pub fn entry(&mut self, key: &str) -> btree_map::Entry<'_, String, T> {
        self.entries.entry(key.to_string())
    }

    pub fn remove(&mut self, key: &str) -> Option<T> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &T)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T> Default for WriteBackCache<T> {
    fn default() -> Self {
        Self::new()
    }
}
