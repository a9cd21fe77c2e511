//! Enumeration over a shelf
//!
//! Each iterator walks one snapshot taken from the store when it was created,
//! decoding documents lazily. Entries pending in the write-back cache override
//! the snapshot for their key; keys only present locally come last.

use std::collections::HashSet;
use std::vec;

use serde::de::DeserializeOwned;

use crate::codec;
use crate::error::Result;
use crate::store::Document;

use super::writeback::WriteBackCache;

/// Keys pending locally that the snapshot does not have
fn local_only<T>(snapshot: &[Document], cache: &WriteBackCache<T>) -> Vec<String> {
    if cache.is_empty() {
        return Vec::new();
    }
    let remote: HashSet<&str> = snapshot.iter().map(|doc| doc.key.as_str()).collect();
    cache
        .keys()
        .filter(|key| !remote.contains(key.as_str()))
        .cloned()
        .collect()
}

/// Iterator over the keys of a shelf
pub struct Keys {
    remote: vec::IntoIter<Document>,
    local: vec::IntoIter<String>,
}

impl Keys {
    pub(crate) fn new<T>(snapshot: Vec<Document>, cache: &WriteBackCache<T>) -> Self {
        let local = local_only(&snapshot, cache);
        Self {
            remote: snapshot.into_iter(),
            local: local.into_iter(),
        }
    }
}

impl Iterator for Keys {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        match self.remote.next() {
            Some(doc) => Some(doc.key),
            None => self.local.next(),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.remote.len() + self.local.len();
        (len, Some(len))
    }
}

/// Iterator over the `(key, value)` pairs of a shelf
///
/// Yields an error for a document whose payload does not decode; the
/// iteration can continue past it.
pub struct Items<'a, T> {
    remote: vec::IntoIter<Document>,
    local: vec::IntoIter<String>,
    cache: &'a WriteBackCache<T>,
}

impl<'a, T> Items<'a, T> {
    pub(crate) fn new(snapshot: Vec<Document>, cache: &'a WriteBackCache<T>) -> Self {
        let local = local_only(&snapshot, cache);
        Self {
            remote: snapshot.into_iter(),
            local: local.into_iter(),
            cache,
        }
    }
}

impl<'a, T: DeserializeOwned + Clone> Iterator for Items<'a, T> {
    type Item = Result<(String, T)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(doc) = self.remote.next() {
            if let Some(value) = self.cache.get(&doc.key) {
                return Some(Ok((doc.key, value.clone())));
            }
            return Some(codec::decode(&doc.payload).map(|value| (doc.key, value)));
        }

        for key in self.local.by_ref() {
            if let Some(value) = self.cache.get(&key) {
                return Some(Ok((key, value.clone())));
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.remote.len() + self.local.len();
        (len, Some(len))
    }
}

/// Iterator over the values of a shelf
pub struct Values<'a, T> {
    items: Items<'a, T>,
}

impl<'a, T> Values<'a, T> {
    pub(crate) fn new(items: Items<'a, T>) -> Self {
        Self { items }
    }
}

impl<'a, T: DeserializeOwned + Clone> Iterator for Values<'a, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        self.items.next().map(|item| item.map(|(_, value)| value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.items.size_hint()
    }
}
