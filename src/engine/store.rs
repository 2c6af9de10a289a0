//! Keyed memo store with single-flight computation
//!
//! Every key owns an async once-cell. Concurrent callers for the same key
//! wait on the same cell, so a value is computed at most once; callers for
//! different keys never block each other. Entries are never evicted.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::OnceCell;

pub struct KeyedStore<V> {
    cells: Mutex<HashMap<String, Arc<OnceCell<V>>>>,
}

impl<V: Clone> KeyedStore<V> {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    fn cell(&self, key: &str) -> Arc<OnceCell<V>> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    /// Value for `key`, running `compute` if no value exists yet. The
    /// second element is true when this call computed the value.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> (V, bool)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V>,
    {
        let cell = self.cell(key);
        let mut computed = false;
        let value = cell
            .get_or_init(|| {
                computed = true;
                compute()
            })
            .await
            .clone();
        (value, computed)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .and_then(|cell| cell.get().cloned())
    }

    /// Store `value`, replacing any existing or in-flight value for `key`
    pub fn insert(&self, key: &str, value: V) {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_string(), Arc::new(OnceCell::new_with(Some(value))));
    }

    /// Store `value` unless `key` already has one
    pub fn insert_if_absent(&self, key: &str, value: V) {
        let cell = self.cell(key);
        let _ = cell.set(value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Snapshot of all computed entries
    pub fn entries(&self) -> Vec<(String, V)> {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter_map(|(key, cell)| cell.get().map(|value| (key.clone(), value.clone())))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.cells
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for KeyedStore<V> {
    fn default() -> Self {
        Self::new()
    }
}
