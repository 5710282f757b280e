//! Process-wide registry of named memoized functions' statistics.
//!
//! Wrappers built with [`MemoizeOptions::name`](crate::MemoizeOptions::name)
//! register their [`CacheStats`] here, so they can be inspected by name
//! without holding the wrapper itself.
//!
//! ```
//! use memento_core::{stats_registry, MemoizeOptions};
//!
//! let square = MemoizeOptions::new()
//!     .name("registry_doc_square")
//!     .build(|n: u32| n * n);
//! square.call(4);
//! square.call(4);
//!
//! let stats = stats_registry::get("registry_doc_square").unwrap();
//! assert_eq!(stats.hits(), 1);
//! assert_eq!(stats.misses(), 1);
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::CacheStats;

static STATS_REGISTRY: Lazy<RwLock<HashMap<String, Arc<CacheStats>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Registers `stats` under `name`, replacing any previous registration.
pub fn register(name: &str, stats: Arc<CacheStats>) {
    STATS_REGISTRY.write().insert(name.to_string(), stats);
}

/// Returns a point-in-time snapshot of the statistics registered as `name`.
pub fn get(name: &str) -> Option<CacheStats> {
    STATS_REGISTRY.read().get(name).map(|stats| (**stats).clone())
}

/// Returns the live statistics registered as `name`.
pub fn get_shared(name: &str) -> Option<Arc<CacheStats>> {
    STATS_REGISTRY.read().get(name).cloned()
}

/// Names of all registered functions.
pub fn list() -> Vec<String> {
    STATS_REGISTRY.read().keys().cloned().collect()
}

/// Resets the counters registered as `name`. Returns `false` if unknown.
pub fn reset(name: &str) -> bool {
    match STATS_REGISTRY.read().get(name) {
        Some(stats) => {
            stats.reset();
            true
        }
        None => false,
    }
}

/// Removes the registration for `name`.
pub fn unregister(name: &str) -> bool {
    STATS_REGISTRY.write().remove(name).is_some()
}

/// Removes every registration. The statistics themselves are left untouched.
pub fn clear() {
    STATS_REGISTRY.write().clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_register_and_get() {
        let stats = Arc::new(CacheStats::new());
        register("registry_test_fn", stats.clone());
        stats.record_hit();

        let snapshot = get("registry_test_fn").unwrap();
        assert_eq!(snapshot.hits(), 1);

        stats.record_hit();
        assert_eq!(snapshot.hits(), 1);
        assert_eq!(get_shared("registry_test_fn").unwrap().hits(), 2);
    }

    #[test]
    #[serial]
    fn test_list_and_clear() {
        clear();
        register("fn1", Arc::new(CacheStats::new()));
        register("fn2", Arc::new(CacheStats::new()));

        let names = list();
        assert!(names.contains(&"fn1".to_string()));
        assert!(names.contains(&"fn2".to_string()));

        clear();
        assert!(list().is_empty());
    }

    #[test]
    #[serial]
    fn test_reset() {
        let stats = Arc::new(CacheStats::new());
        register("registry_reset_fn", stats.clone());
        stats.record_hit();
        stats.record_miss();

        assert!(reset("registry_reset_fn"));
        assert_eq!(stats.total_accesses(), 0);
        assert!(!reset("nonexistent"));
    }

    #[test]
    #[serial]
    fn test_unregister() {
        register("registry_unregister_fn", Arc::new(CacheStats::new()));
        assert!(unregister("registry_unregister_fn"));
        assert!(!unregister("registry_unregister_fn"));
        assert!(get("registry_unregister_fn").is_none());
    }
}
