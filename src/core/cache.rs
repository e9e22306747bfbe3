use std::collections::HashMap;
use std::hash::Hash;
use std::time::{
    Duration,
    Instant,
};

use crate::core::time::{
    Env,
    SystemEnv,
};

#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    in_cache_since: Instant,
}

/// Maintains a set of key -> value mappings which expire a fixed time after
/// they were last set.
///
/// Expiry is lazy: an entry is only evicted when a lookup finds it too old or
/// when the whole cache is purged.
#[derive(Debug)]
pub struct TimedCache<K, V, T = SystemEnv>
where
    K: Eq + Hash,
    T: Env,
{
    entries: HashMap<K, Entry<V>>,
    expiration: Option<Duration>,
    time_env: T,
}

impl<K, V, T> TimedCache<K, V, T>
where
    K: Eq + Hash + Clone,
    T: Env,
{
    /// Creates a cache where mappings expire after expiration. A zero
    /// expiration disables expiry altogether.
    pub fn new(expiration: Duration, time_env: T) -> TimedCache<K, V, T> {
        TimedCache {
            entries: HashMap::new(),
            expiration: if expiration == Duration::from_secs(0) {
                None
            } else {
                Some(expiration)
            },
            time_env,
        }
    }

    /// Lookup the value for a key, evicting the entry first if it expired.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        self.expire(key);
        self.entries.get(key).map(|entry| &entry.value)
    }

    /// Like get(...) but returns a mutable reference. Does not refresh the
    /// entry.
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.expire(key);
        self.entries.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Create or update the mapping for a key and restart its expiration.
    pub fn set(&mut self, key: K, value: V) {
        let in_cache_since = self.time_env.now_instant();
        self.entries.insert(
            key,
            Entry {
                value,
                in_cache_since,
            },
        );
    }

    /// Removes the mapping for a key, returning the value if it had not
    /// expired.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        self.expire(key);
        self.entries.remove(key).map(|entry| entry.value)
    }

    /// Checks for a live mapping.
    pub fn contains(&mut self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Visits every live mapping along with the time it was last set.
    pub fn for_each<F>(&mut self, mut f: F)
    where
        F: FnMut(&K, &V, Instant),
    {
        self.purge();
        for (key, entry) in self.entries.iter() {
            f(key, &entry.value, entry.in_cache_since);
        }
    }

    /// Purge all entries that have expired.
    pub fn purge(&mut self) {
        if let Some(expiration) = self.expiration {
            let now = self.time_env.now_instant();
            self.entries
                .retain(|_, entry| now.duration_since(entry.in_cache_since) <= expiration);
        }
    }

    /// Returns the number of entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn expire(&mut self, key: &K) {
        let expiration = match self.expiration {
            Some(expiration) => expiration,
            None => return,
        };

        let now = self.time_env.now_instant();
        let expired = match self.entries.get(key) {
            Some(entry) => now.duration_since(entry.in_cache_since) > expiration,
            None => false,
        };

        if expired {
            self.entries.remove(key);
        }
    }
}
