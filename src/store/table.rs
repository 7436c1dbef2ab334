//! Append/merge table keyed by a stable id
//!
//! Keeps first-insertion order for iteration and stamps every entry with a
//! revision that only moves when a merge actually changes the value. The
//! memo layer keys cached derivations on these revisions.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    revision: u64,
}

#[derive(Debug, Clone)]
pub struct Table<K, V> {
    entries: HashMap<K, Entry<V>>,
    order: Vec<K>,
    revision: u64,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            order: Vec::new(),
            revision: 0,
        }
    }
}

impl<K, V> Table<K, V>
where
    K: Eq + Hash + Clone,
    V: PartialEq,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry. Returns true if the table changed.
    pub fn upsert(&mut self, key: K, value: V) -> bool {
        match self.entries.get_mut(&key) {
            Some(entry) if entry.value == value => false,
            Some(entry) => {
                self.revision += 1;
                entry.value = value;
                entry.revision = self.revision;
                true
            }
            None => {
                self.revision += 1;
                self.order.push(key.clone());
                self.entries.insert(
                    key,
                    Entry {
                        value,
                        revision: self.revision,
                    },
                );
                true
            }
        }
    }

    /// Merge many entries. Returns true if any of them changed the table.
    pub fn merge<I>(&mut self, items: I) -> bool
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let mut changed = false;
        for (key, value) in items {
            changed |= self.upsert(key, value);
        }
        changed
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|e| &e.value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.contains_key(key)
    }

    /// Revision at which this entry last changed
    pub fn revision_of<Q>(&self, key: &Q) -> Option<u64>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|e| e.revision)
    }

    /// Revision of the most recent change anywhere in the table
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Keys in first-insertion order
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Entries in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.order
            .iter()
            .filter_map(move |k| self.entries.get(k).map(|e| (k, &e.value)))
    }

    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, v)| v)
    }
}
