use rustc_hash::FxHashMap;
use std::hash::Hash;

pub const DEFAULT_CAPACITY: usize = 256;

/// A map capped at a fixed number of entries.
///
/// When an insert would exceed the capacity the whole map is cleared first. Nothing
/// depends on which entries survive, only on the cache staying bounded.
#[derive(Debug, Clone)]
pub struct BoundedCache<K, V> {
    entries: FxHashMap<K, V>,
    capacity: usize,
}

impl<K: Eq + Hash, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: FxHashMap::default(),
            capacity: capacity.max(1),
        }
    }

    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: std::borrow::Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.entries.get(key).cloned()
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.len() >= self.capacity && !self.entries.contains_key(&key) {
            tracing::trace!(capacity = self.capacity, "bounded cache overflow, clearing");
            self.entries.clear();
        }
        self.entries.insert(key, value);
    }

    pub fn get_or_insert_with<Q>(&mut self, key: &Q, f: impl FnOnce() -> V) -> V
    where
        K: std::borrow::Borrow<Q> + for<'q> From<&'q Q>,
        Q: Eq + Hash + ?Sized,
    {
        if let Some(value) = self.entries.get(key) {
            return value.clone();
        }

        let value = f();
        self.insert(K::from(key), value.clone());
        value
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Eq + Hash, V: Clone> Default for BoundedCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
