use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, ser::SerializeMap};

/// Read-only map keyed by handler name.
///
/// Cloning is cheap (the entries live behind an `Arc`) and there are no
/// mutating methods, so a map handed to a caller can never change under it.
/// Iteration follows insertion order; equality compares content only.
pub struct HandlerMap<V> {
    inner: Arc<Inner<V>>,
}

struct Inner<V> {
    entries: Vec<(String, V)>,
    index: BTreeMap<String, usize>,
}

impl<V> HandlerMap<V> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Vec::new(),
                index: BTreeMap::new(),
            }),
        }
    }

    pub fn get(&self, handler_name: &str) -> Option<&V> {
        self.inner
            .index
            .get(handler_name)
            .map(|&position| &self.inner.entries[position].1)
    }

    pub fn contains_key(&self, handler_name: &str) -> bool {
        self.inner.index.contains_key(handler_name)
    }

    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.inner
            .entries
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(name, _)| name)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    pub fn first(&self) -> Option<(&str, &V)> {
        self.iter().next()
    }

    /// Entries ordered by handler name, for stable diagnostics.
    pub fn sorted(&self) -> Vec<(&str, &V)> {
        self.inner
            .index
            .iter()
            .map(|(name, &position)| (name.as_str(), &self.inner.entries[position].1))
            .collect()
    }
}

impl<V: Clone> HandlerMap<V> {
    /// Owned copy, detached from this map.
    pub fn to_btree_map(&self) -> BTreeMap<String, V> {
        self.inner.entries.iter().cloned().collect()
    }
}

impl<V> Default for HandlerMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for HandlerMap<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// A repeated handler name replaces the earlier value but keeps its position.
impl<V> FromIterator<(String, V)> for HandlerMap<V> {
    fn from_iter<I: IntoIterator<Item = (String, V)>>(iter: I) -> Self {
        let mut entries: Vec<(String, V)> = Vec::new();
        let mut index = BTreeMap::new();

        for (name, value) in iter {
            match index.get(&name) {
                Some(&position) => entries[position] = (name, value),
                None => {
                    index.insert(name.clone(), entries.len());
                    entries.push((name, value));
                }
            }
        }

        Self {
            inner: Arc::new(Inner { entries, index }),
        }
    }
}

impl<V> From<BTreeMap<String, V>> for HandlerMap<V> {
    fn from(map: BTreeMap<String, V>) -> Self {
        map.into_iter().collect()
    }
}

impl<V: PartialEq> PartialEq for HandlerMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(name, value)| other.get(name) == Some(value))
    }
}

impl<V: Eq> Eq for HandlerMap<V> {}

impl<V: fmt::Debug> fmt::Debug for HandlerMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V: Serialize> Serialize for HandlerMap<V> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'a, V> IntoIterator for &'a HandlerMap<V> {
    type Item = (&'a str, &'a V);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a V)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}
