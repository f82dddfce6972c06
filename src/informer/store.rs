use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Object;
use super::WatchEvent;
use crate::InformerError;
use crate::Result;

/// Computes the index values an item is filed under
pub type IndexFunc<T> = Arc<dyn Fn(&T) -> Vec<String> + Send + Sync>;

struct StoreInner<T> {
    items: BTreeMap<String, Arc<T>>,
    indexers: HashMap<String, IndexFunc<T>>,
    /// index name -> index value -> item keys
    indices: HashMap<String, HashMap<String, BTreeSet<String>>>,
}

impl<T: Object> StoreInner<T> {
    fn index_item(
        &mut self,
        key: &str,
        item: &T,
    ) {
        for (name, index_fn) in &self.indexers {
            let index = self.indices.entry(name.clone()).or_default();
            for value in index_fn(item) {
                index.entry(value).or_default().insert(key.to_string());
            }
        }
    }

    fn unindex_item(
        &mut self,
        key: &str,
        item: &T,
    ) {
        for (name, index_fn) in &self.indexers {
            let Some(index) = self.indices.get_mut(name) else {
                continue;
            };
            for value in index_fn(item) {
                if let Some(keys) = index.get_mut(&value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&value);
                    }
                }
            }
        }
    }

    fn upsert(
        &mut self,
        item: Arc<T>,
    ) -> Option<Arc<T>> {
        let key = item.key();
        let old = self.items.insert(key.clone(), item.clone());
        if let Some(old) = &old {
            self.unindex_item(&key, old);
        }
        self.index_item(&key, &item);
        old
    }

    fn remove(
        &mut self,
        key: &str,
    ) -> Option<Arc<T>> {
        let old = self.items.remove(key)?;
        self.unindex_item(key, &old);
        Some(old)
    }
}

/// Thread-safe cache of the items an informer has observed, keyed by
/// `namespace/name` and iterated in key order.
pub struct Store<T> {
    inner: RwLock<StoreInner<T>>,
}

impl<T> fmt::Debug for Store<T> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("Store")
            .field("items", &inner.items.len())
            .field("indexers", &inner.indexers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<T: Object> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Object> Store<T> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                items: BTreeMap::new(),
                indexers: HashMap::new(),
                indices: HashMap::new(),
            }),
        }
    }

    /// Registers a named index and files every existing item under it.
    pub fn add_indexer(
        &self,
        name: &str,
        index_fn: IndexFunc<T>,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.indexers.contains_key(name) {
            return Err(InformerError::IndexerConflict(format!("indexer {name} already exists")).into());
        }

        let mut index: HashMap<String, BTreeSet<String>> = HashMap::new();
        for (key, item) in &inner.items {
            for value in index_fn(item.as_ref()) {
                index.entry(value).or_default().insert(key.clone());
            }
        }
        inner.indices.insert(name.to_string(), index);
        inner.indexers.insert(name.to_string(), index_fn);
        Ok(())
    }

    /// Inserts or replaces an item, returning the previous version.
    pub fn upsert(
        &self,
        item: Arc<T>,
    ) -> Option<Arc<T>> {
        self.inner.write().upsert(item)
    }

    pub fn delete(
        &self,
        key: &str,
    ) -> Option<Arc<T>> {
        self.inner.write().remove(key)
    }

    /// Replaces the whole content with `items` and returns the events that
    /// turn the previous content into the new one: `Add` for unknown keys,
    /// `Update` for known keys, `Delete` for keys that vanished.
    pub fn replace(
        &self,
        items: Vec<Arc<T>>,
        is_initial_list: bool,
    ) -> Vec<WatchEvent<T>> {
        let mut inner = self.inner.write();
        let mut events = Vec::with_capacity(items.len());
        let mut seen = BTreeSet::new();

        for item in items {
            seen.insert(item.key());
            match inner.upsert(item.clone()) {
                Some(old) => events.push(WatchEvent::Update { old, new: item }),
                None => events.push(WatchEvent::Add { item, is_initial_list }),
            }
        }

        let vanished: Vec<String> = inner.items.keys().filter(|k| !seen.contains(*k)).cloned().collect();
        for key in vanished {
            if let Some(item) = inner.remove(&key) {
                events.push(WatchEvent::Delete { item });
            }
        }

        events
    }

    pub fn get_by_key(
        &self,
        key: &str,
    ) -> Option<Arc<T>> {
        self.inner.read().items.get(key).cloned()
    }

    /// Snapshot of all items in key order
    pub fn list(&self) -> Vec<Arc<T>> {
        self.inner.read().items.values().cloned().collect()
    }

    pub fn list_keys(&self) -> Vec<String> {
        self.inner.read().items.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items filed under `value` in the index `index_name`
    pub fn by_index(
        &self,
        index_name: &str,
        value: &str,
    ) -> Result<Vec<Arc<T>>> {
        let inner = self.inner.read();
        if !inner.indexers.contains_key(index_name) {
            return Err(InformerError::IndexNotFound(index_name.to_string()).into());
        }

        let items = inner
            .indices
            .get(index_name)
            .and_then(|index| index.get(value))
            .map(|keys| keys.iter().filter_map(|k| inner.items.get(k).cloned()).collect())
            .unwrap_or_default();
        Ok(items)
    }
}
