use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tracing::debug;

use crate::cache_entry::CacheEntry;
use crate::config::{ExpiringOptions, OnExpire};
use crate::keys::CacheKey;

/// Key/value store backing a memoized function.
///
/// The store runs in one of two modes:
///
/// - **Non-expiring** ([`CacheStore::new`]): a plain mapping; entries live
///   until they are deleted or the store is cleared.
/// - **Expiring** ([`CacheStore::expiring`]): every entry carries a TTL.
///   Expired entries are never returned. They are detected lazily by
///   [`get`](Self::get) or proactively by [`purge_expired`](Self::purge_expired),
///   and each one fires the `on_expire` callback exactly once.
///
/// Entries are kept in a [`DashMap`], so the store can be shared between
/// threads. No internal lock is held while user callbacks run.
///
/// # Examples
///
/// ## Non-expiring
///
/// ```
/// use memento_core::CacheStore;
///
/// let store = CacheStore::new();
/// store.set("answer", 42);
/// assert_eq!(store.get(&"answer"), Some(42));
///
/// store.delete(&"answer");
/// assert_eq!(store.get(&"answer"), None);
/// ```
///
/// ## Expiring
///
/// ```
/// use memento_core::{CacheStore, ExpiringOptions};
/// use std::time::Duration;
///
/// let store = CacheStore::expiring(ExpiringOptions::new(Duration::from_secs(60)));
/// store.set("session", "token".to_string());
/// store.set_with_ttl("nonce", "abc".to_string(), Duration::ZERO);
///
/// assert!(store.get(&"session").is_some());
/// assert!(store.get(&"nonce").is_none()); // zero TTL expires immediately
/// ```
pub struct CacheStore<K, V> {
    entries: DashMap<K, CacheEntry<V>>,
    default_ttl: Option<Duration>,
    on_expire: Option<OnExpire<K>>,
}

impl<K: CacheKey, V: Clone> CacheStore<K, V> {
    /// Creates a non-expiring store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: None,
            on_expire: None,
        }
    }

    /// Creates an expiring store.
    pub fn expiring(options: ExpiringOptions<K>) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: Some(options.default_ttl),
            on_expire: options.on_expire,
        }
    }

    /// Returns `true` when the store was created in expiring mode.
    pub fn is_expiring(&self) -> bool {
        self.default_ttl.is_some()
    }

    /// TTL applied by [`set`](Self::set); `None` in non-expiring mode.
    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Looks up a live entry.
    ///
    /// If the entry has expired it is removed, `on_expire` fires with its
    /// key, and `None` is returned.
    pub fn get(&self, key: &K) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };

        // The shard guard is released above; a concurrent `set` may have
        // refreshed the entry in between, so only remove it if still stale.
        if expired && self.remove_expired(key) {
            self.notify_expired(key);
        }
        None
    }

    /// Returns `true` if a live entry exists for `key`. Never fires
    /// `on_expire`.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries
            .get(key)
            .map_or(false, |entry| !entry.is_expired())
    }

    /// Stores `value` under `key` with the default TTL, replacing any
    /// previous entry and restarting its expiry clock. Returns the id of the
    /// new entry.
    pub fn set(&self, key: K, value: V) -> u64 {
        self.insert_entry(key, CacheEntry::new(value, self.default_ttl))
    }

    /// Stores `value` under `key` with an explicit TTL.
    pub fn set_with_ttl(&self, key: K, value: V, ttl: Duration) -> u64 {
        self.insert_entry(key, CacheEntry::new(value, Some(ttl)))
    }

    /// Stores a pre-built entry. The entry's TTL is used as-is.
    pub fn insert_entry(&self, key: K, entry: CacheEntry<V>) -> u64 {
        let id = entry.id;
        self.entries.insert(key, entry);
        id
    }

    /// Removes the entry for `key`. Returns the removed value if it was
    /// still live. No-op when the key is absent; never fires `on_expire`.
    pub fn delete(&self, key: &K) -> Option<V> {
        self.entries
            .remove(key)
            .and_then(|(_, entry)| (!entry.is_expired()).then_some(entry.value))
    }

    /// Removes the entry for `key` only if it is the entry with the given
    /// id. Returns `true` if something was removed.
    pub fn delete_entry(&self, key: &K, id: u64) -> bool {
        self.entries.remove_if(key, |_, entry| entry.id == id).is_some()
    }

    /// Removes every entry and returns the live key/value pairs that were
    /// removed. Entries that had already expired are dropped silently.
    pub fn clear(&self) -> HashMap<K, V> {
        let now = Instant::now();
        let keys: Vec<K> = self.entries.iter().map(|e| e.key().clone()).collect();

        keys.into_iter()
            .filter_map(|key| self.entries.remove(&key))
            .filter(|(_, entry)| !entry.is_expired_at(now))
            .map(|(key, entry)| (key, entry.value))
            .collect()
    }

    /// Removes every expired entry, firing `on_expire` for each one, and
    /// returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let stale: Vec<K> = self
            .entries
            .iter()
            .filter(|e| e.value().is_expired_at(now))
            .map(|e| e.key().clone())
            .collect();

        let mut removed = 0;
        for key in stale {
            if self.remove_expired(&key) {
                removed += 1;
                self.notify_expired(&key);
            }
        }

        if removed > 0 {
            debug!(removed, "purged expired cache entries");
        }
        removed
    }

    /// Number of stored entries, including expired entries that have not
    /// been detected yet.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keys of all live entries, in no particular order.
    pub fn keys(&self) -> Vec<K> {
        let now = Instant::now();
        self.entries
            .iter()
            .filter(|e| !e.value().is_expired_at(now))
            .map(|e| e.key().clone())
            .collect()
    }

    /// Time left before the entry for `key` expires.
    ///
    /// `None` if the key is absent or the entry never expires.
    pub fn remaining_ttl(&self, key: &K) -> Option<Duration> {
        self.entries.get(key).and_then(|entry| entry.remaining())
    }

    fn remove_expired(&self, key: &K) -> bool {
        self.entries
            .remove_if(key, |_, entry| entry.is_expired())
            .is_some()
    }

    fn notify_expired(&self, key: &K) {
        debug!(ttl = ?self.default_ttl, "cache entry expired");
        if let Some(on_expire) = &self.on_expire {
            on_expire(key);
        }
    }
}

impl<K: CacheKey, V: Clone> Default for CacheStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: CacheKey, V> fmt::Debug for CacheStore<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheStore")
            .field("len", &self.entries.len())
            .field("default_ttl", &self.default_ttl)
            .field("on_expire", &self.on_expire.is_some())
            .finish()
    }
}
