use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// Per-family instrument cache: `key -> instrument`, or `None` when the
/// registry declined to back that key.
///
/// Entries are created on first observation and never evicted.
pub struct InstrumentCache<K, V> {
    map: DashMap<K, Option<V>>,
}

impl<K, V> Default for InstrumentCache<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self { map: DashMap::new() }
    }
}

impl<K, V> InstrumentCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached instrument for `key`, registering it on first use.
    ///
    /// `register` runs at most once per key. Concurrent callers racing on the
    /// same new key block on the shard lock and observe the winner's result.
    pub fn get_or_register(&self, key: K, register: impl FnOnce(&K) -> Option<V>) -> Option<V> {
        if let Some(hit) = self.map.get(&key) {
            return hit.value().clone();
        }
        match self.map.entry(key) {
            Entry::Occupied(o) => o.get().clone(),
            Entry::Vacant(v) => {
                let instrument = register(v.key());
                v.insert(instrument.clone());
                instrument
            }
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
