//! Memo table for per-entity derivations
//!
//! Each entry is keyed by entity id and stamped with the dependency tuple it
//! was computed from (revisions of the store slices it read, the time
//! bucket, ...). A lookup with a different tuple recomputes and replaces the
//! entry. Errors are never cached.

use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

use crate::error::EngineResult;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug, Clone)]
pub struct Memo<K, D, V> {
    name: &'static str,
    entries: HashMap<K, (D, V)>,
    hits: u64,
    misses: u64,
}

impl<K, D, V> Memo<K, D, V>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
    D: PartialEq,
    V: Clone,
{
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Cached value when `deps` match, otherwise compute and store
    pub fn get_or_compute<F>(&mut self, key: &K, deps: D, compute: F) -> EngineResult<V>
    where
        F: FnOnce() -> EngineResult<V>,
    {
        if let Some((cached_deps, value)) = self.entries.get(key) {
            if *cached_deps == deps {
                self.hits += 1;
                trace!("{} memo hit for {:?}", self.name, key);
                return Ok(value.clone());
            }
        }

        self.misses += 1;
        let value = compute()?;
        self.entries.insert(key.clone(), (deps, value.clone()));
        Ok(value)
    }

    /// Drop entries whose key fails the predicate
    pub fn retain_keys<F: FnMut(&K) -> bool>(&mut self, mut keep: F) {
        self.entries.retain(|key, _| keep(key));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> MemoStats {
        MemoStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
        }
    }
}
