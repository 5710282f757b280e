use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::ReentrantMutex;
use tracing::{debug, trace, warn};

use crate::cache_entry::{next_entry_id, CacheEntry};
use crate::config::ExpiringOptions;
use crate::keys::{Args, CacheKey, HashKeyResolver, KeyResolver};
use crate::memoizable::{Cleanup, Memoizable};
use crate::store::CacheStore;

#[cfg(feature = "stats")]
use crate::stats::CacheStats;

type MemoFn<A, R> = Arc<dyn Fn(A) -> R + Send + Sync>;
type MemoResolver<A, K> = Arc<dyn KeyResolver<A, Key = K>>;
type Gates<K> = DashMap<K, Arc<ReentrantMutex<()>>>;

/// Membership in the group of callers missing on one key.
///
/// Dropping the last member removes the key's gate.
struct Flight<'a, K: CacheKey> {
    gates: &'a Gates<K>,
    key: K,
    gate: Arc<ReentrantMutex<()>>,
}

impl<'a, K: CacheKey> Flight<'a, K> {
    fn join(gates: &'a Gates<K>, key: &K) -> Self {
        let gate = Arc::clone(&gates.entry(key.clone()).or_default());
        Self {
            gates,
            key: key.clone(),
            gate,
        }
    }
}

impl<K: CacheKey> Drop for Flight<'_, K> {
    fn drop(&mut self) {
        // One reference in the map, one held here.
        self.gates.remove_if(&self.key, |_, gate| {
            Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) == 2
        });
    }
}

/// A function wrapped with a result cache.
///
/// Calling [`call`](Self::call) derives a key from the arguments, returns the
/// cached result for that key when there is one, and otherwise invokes the
/// wrapped function and caches what it returned.
///
/// `A` is the argument list (use a tuple for several arguments), `R` the
/// return type and `K` the cache key type (`i32` with the default key
/// deriver).
///
/// A few rules govern what ends up in the cache:
///
/// * The result is stored only after the function returns. A panicking call
///   stores nothing.
/// * Values for which [`Memoizable::should_cache`] is `false` (such as `Err`)
///   are returned but not stored.
/// * Deferred values are stored immediately, before they settle, so
///   concurrent callers share one computation. If one later fails it evicts
///   its own entry.
/// * If the key cannot be derived, the call bypasses the cache.
///
/// Threads missing on the same key at the same time are serialized: the
/// first one runs the function and the others pick up its cached result, so
/// the function runs at most once per key. Only that key is held while the
/// function runs, so it may recursively call its own wrapper with other
/// arguments. Two threads whose computations wait on each other's keys will
/// deadlock.
///
/// Clones share the cache.
///
/// # Examples
///
/// ```
/// use memento_core::memoize;
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let counter = calls.clone();
/// let add = memoize(move |(a, b): (i64, i64)| {
///     counter.fetch_add(1, Ordering::SeqCst);
///     a + b
/// });
///
/// assert_eq!(add.call((2, 3)), 5);
/// assert_eq!(add.call((2, 3)), 5);
/// assert_eq!(calls.load(Ordering::SeqCst), 1);
///
/// add.invalidate(&(2, 3));
/// assert_eq!(add.call((2, 3)), 5);
/// assert_eq!(calls.load(Ordering::SeqCst), 2);
/// ```
pub struct Memoized<A, R, K = i32> {
    func: MemoFn<A, R>,
    resolver: MemoResolver<A, K>,
    cache: Arc<CacheStore<K, R>>,
    gates: Arc<Gates<K>>,
    name: Option<String>,
    #[cfg(feature = "stats")]
    stats: Arc<CacheStats>,
}

impl<A, R, K> Memoized<A, R, K>
where
    R: Memoizable,
    K: CacheKey,
{
    /// Returns the result for `args`, from the cache when possible.
    pub fn call(&self, args: A) -> R {
        let key = match self.resolver.resolve(&args) {
            Ok(key) => key,
            Err(err) => {
                warn!(name = self.label(), error = %err, "failed to derive cache key, bypassing cache");
                #[cfg(feature = "stats")]
                self.stats.record_bypass();
                return (self.func)(args);
            }
        };

        if let Some(value) = self.lookup(&key) {
            return value;
        }

        let flight = Flight::join(&self.gates, &key);
        let _turn = flight.gate.lock();

        // Another caller may have filled the entry while this one waited.
        if let Some(value) = self.lookup(&key) {
            return value;
        }

        trace!(name = self.label(), "cache miss");
        #[cfg(feature = "stats")]
        self.stats.record_miss();

        let result = (self.func)(args);
        if !result.should_cache() {
            debug!(name = self.label(), "result not cached");
            return result;
        }

        let id = next_entry_id();
        let result = result.on_reject(self.rejection_cleanup(key.clone(), id));
        self.cache.insert_entry(
            key,
            CacheEntry::with_id(result.clone(), self.cache.default_ttl(), id),
        );
        result
    }

    /// Removes the cached result for `args` and returns it, if it was live.
    ///
    /// The next call with the same arguments recomputes. Does nothing when
    /// nothing is cached or the key cannot be derived.
    pub fn invalidate(&self, args: &A) -> Option<R> {
        match self.resolver.resolve(args) {
            Ok(key) => self.cache.delete(&key),
            Err(err) => {
                warn!(name = self.label(), error = %err, "failed to derive cache key, nothing invalidated");
                None
            }
        }
    }

    /// Empties the cache and returns everything that was in it.
    pub fn clear(&self) -> HashMap<K, R> {
        let removed = self.cache.clear();
        debug!(name = self.label(), removed = removed.len(), "cache cleared");
        removed
    }

    /// The underlying store, for direct inspection or manipulation.
    pub fn cache(&self) -> &Arc<CacheStore<K, R>> {
        &self.cache
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[cfg(feature = "stats")]
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    fn lookup(&self, key: &K) -> Option<R> {
        let value = self.cache.get(key)?;
        trace!(name = self.label(), "cache hit");
        #[cfg(feature = "stats")]
        self.stats.record_hit();
        Some(value)
    }

    fn label(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }

    /// Evicts the entry `id` under `key`, provided it has not been replaced.
    fn rejection_cleanup(&self, key: K, id: u64) -> Cleanup {
        let cache = Arc::downgrade(&self.cache);
        let name = self.label().to_string();
        #[cfg(feature = "stats")]
        let stats = Arc::clone(&self.stats);

        Cleanup::new(move || {
            #[cfg(feature = "stats")]
            stats.record_rejection();
            let evicted = cache
                .upgrade()
                .map_or(false, |cache| cache.delete_entry(&key, id));
            debug!(name = %name, evicted, "deferred result rejected");
        })
    }
}

impl<A, R, K> Clone for Memoized<A, R, K> {
    fn clone(&self) -> Self {
        Self {
            func: Arc::clone(&self.func),
            resolver: Arc::clone(&self.resolver),
            cache: Arc::clone(&self.cache),
            gates: Arc::clone(&self.gates),
            name: self.name.clone(),
            #[cfg(feature = "stats")]
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<A, R, K: CacheKey> fmt::Debug for Memoized<A, R, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memoized")
            .field("name", &self.name)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Wraps `func` with a non-expiring cache keyed by the default key deriver.
///
/// ```
/// use memento_core::memoize;
///
/// let square = memoize(|n: u64| n * n);
/// assert_eq!(square.call(12), 144);
/// assert_eq!(square.cache().len(), 1);
/// ```
pub fn memoize<A, R, F>(func: F) -> Memoized<A, R>
where
    A: Args + 'static,
    R: Memoizable,
    F: Fn(A) -> R + Send + Sync + 'static,
{
    MemoizeOptions::new().build(func)
}

/// Builder for [`Memoized`].
///
/// ```
/// use memento_core::{ExpiringOptions, MemoizeOptions};
/// use std::time::Duration;
///
/// // Keyed by the length of the input, entries live for one minute.
/// let len = MemoizeOptions::with_key_resolver(|s: &String| s.len())
///     .expiring(ExpiringOptions::new(Duration::from_secs(60)))
///     .name("len")
///     .build(|s: String| s.chars().count());
///
/// assert_eq!(len.call("four".to_string()), 4);
/// assert_eq!(len.cache().keys(), vec![4]);
/// ```
pub struct MemoizeOptions<A, K = i32> {
    resolver: MemoResolver<A, K>,
    expiring: Option<ExpiringOptions<K>>,
    name: Option<String>,
    _args: PhantomData<fn(A)>,
}

impl<A: Args + 'static> MemoizeOptions<A, i32> {
    /// Options using the default key deriver.
    pub fn new() -> Self {
        Self::with_key_resolver(HashKeyResolver::new())
    }
}

impl<A: Args + 'static> Default for MemoizeOptions<A, i32> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A, K: CacheKey> MemoizeOptions<A, K> {
    /// Options using a custom key resolver.
    pub fn with_key_resolver<Res>(resolver: Res) -> Self
    where
        Res: KeyResolver<A, Key = K> + 'static,
    {
        Self {
            resolver: Arc::new(resolver),
            expiring: None,
            name: None,
            _args: PhantomData,
        }
    }

    /// Makes the cache expiring.
    pub fn expiring(mut self, options: ExpiringOptions<K>) -> Self {
        self.expiring = Some(options);
        self
    }

    /// Shorthand for an expiring cache without an expiry callback.
    pub fn ttl(self, ttl: Duration) -> Self {
        self.expiring(ExpiringOptions::new(ttl))
    }

    /// Names the wrapper. Named wrappers show up in logs and, with the
    /// `stats` feature, in [`stats_registry`](crate::stats_registry).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn build<R, F>(self, func: F) -> Memoized<A, R, K>
    where
        R: Memoizable,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let cache = match self.expiring {
            Some(options) => CacheStore::expiring(options),
            None => CacheStore::new(),
        };

        #[cfg(feature = "stats")]
        let stats = Arc::new(CacheStats::new());
        #[cfg(feature = "stats")]
        if let Some(name) = &self.name {
            crate::stats_registry::register(name, Arc::clone(&stats));
        }

        Memoized {
            func: Arc::new(func),
            resolver: self.resolver,
            cache: Arc::new(cache),
            gates: Arc::new(DashMap::new()),
            name: self.name,
            #[cfg(feature = "stats")]
            stats,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::thread;

    fn counting<A, R>(
        f: impl Fn(A) -> R + Send + Sync + 'static,
    ) -> (impl Fn(A) -> R + Send + Sync + 'static, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let wrapped = move |args: A| {
            counter.fetch_add(1, Ordering::SeqCst);
            f(args)
        };
        (wrapped, calls)
    }

    #[derive(Clone, Debug)]
    struct Rejectable {
        value: u32,
        cleanup: Arc<Mutex<Option<Cleanup>>>,
    }

    impl Rejectable {
        fn new(value: u32) -> Self {
            Self {
                value,
                cleanup: Arc::new(Mutex::new(None)),
            }
        }

        fn reject(&self) {
            if let Some(cleanup) = self.cleanup.lock().unwrap().take() {
                cleanup.run();
            }
        }
    }

    impl Memoizable for Rejectable {
        fn on_reject(self, cleanup: Cleanup) -> Self {
            *self.cleanup.lock().unwrap() = Some(cleanup);
            self
        }
    }

    #[test]
    fn test_hit_skips_function() {
        let (f, calls) = counting(|n: u32| n + 1);
        let memo = memoize(f);

        assert_eq!(memo.call(1), 2);
        assert_eq!(memo.call(1), 2);
        assert_eq!(memo.call(2), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        #[cfg(feature = "stats")]
        {
            assert_eq!(memo.stats().hits(), 1);
            assert_eq!(memo.stats().misses(), 2);
        }
    }

    #[test]
    fn test_invalidate_forces_recompute() {
        let (f, calls) = counting(|n: u32| n * 10);
        let memo = memoize(f);

        memo.call(3);
        assert_eq!(memo.invalidate(&3), Some(30));
        assert_eq!(memo.invalidate(&3), None);
        memo.call(3);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_clear_returns_contents() {
        let memo = memoize(|n: u32| n);
        memo.call(1);
        memo.call(2);

        let removed = memo.clear();
        assert_eq!(removed.len(), 2);
        assert!(memo.cache().is_empty());
    }

    #[test]
    fn test_err_is_not_cached() {
        let (f, calls) = counting(|n: i32| if n < 0 { Err("negative") } else { Ok(n) });
        let memo = memoize(f);

        assert_eq!(memo.call(-1), Err("negative"));
        assert_eq!(memo.call(-1), Err("negative"));
        assert_eq!(memo.call(4), Ok(4));
        assert_eq!(memo.call(4), Ok(4));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(memo.cache().len(), 1);
    }

    #[test]
    fn test_panic_stores_nothing() {
        let memo = memoize(|n: u32| {
            if n == 0 {
                panic!("zero");
            }
            n
        });

        let outcome = catch_unwind(AssertUnwindSafe(|| memo.call(0)));
        assert!(outcome.is_err());
        assert!(memo.cache().is_empty());
    }

    #[test]
    fn test_custom_resolver() {
        let (f, calls) = counting(|(id, _label): (u32, String)| id * 2);
        let memo = MemoizeOptions::with_key_resolver(|args: &(u32, String)| args.0).build(f);

        assert_eq!(memo.call((7, "first".into())), 14);
        assert_eq!(memo.call((7, "second".into())), 14);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(memo.cache().keys(), vec![7]);
    }

    #[test]
    fn test_expiring_recomputes_after_ttl() {
        let (f, calls) = counting(|n: u32| n);
        let memo = MemoizeOptions::new().ttl(Duration::from_millis(30)).build(f);

        memo.call(1);
        memo.call(1);
        thread::sleep(Duration::from_millis(50));
        memo.call(1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_ttl_never_hits() {
        let (f, calls) = counting(|n: u32| n);
        let memo = MemoizeOptions::new()
            .expiring(ExpiringOptions::from_millis(0))
            .build(f);

        memo.call(1);
        memo.call(1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_rejection_evicts_entry() {
        let (f, calls) = counting(Rejectable::new);
        let memo = memoize(f);

        let first = memo.call(5);
        assert_eq!(memo.call(5).value, 5);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        first.reject();
        assert!(memo.cache().is_empty());
        #[cfg(feature = "stats")]
        assert_eq!(memo.stats().rejections(), 1);

        memo.call(5);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_late_rejection_leaves_newer_entry() {
        let memo = memoize(Rejectable::new);

        let stale = memo.call(5);
        memo.invalidate(&5);
        let fresh = memo.call(5);

        stale.reject();
        assert_eq!(memo.cache().len(), 1);
        fresh.reject();
        assert!(memo.cache().is_empty());
    }

    #[test]
    fn test_rejection_after_wrapper_dropped() {
        let memo = memoize(Rejectable::new);
        let value = memo.call(1);
        drop(memo);
        value.reject();
    }

    #[test]
    fn test_clones_share_cache() {
        let (f, calls) = counting(|n: u32| n);
        let memo = memoize(f);
        let other = memo.clone();

        memo.call(9);
        other.call(9);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parallel_misses_invoke_once() {
        let (f, calls) = counting(|n: u64| {
            thread::sleep(Duration::from_millis(30));
            n + 1
        });
        let memo = memoize(f);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let memo = memo.clone();
                thread::spawn(move || memo.call(41))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(memo.gates.is_empty());
    }

    #[test]
    fn test_gate_released_after_panic() {
        let memo = memoize(|n: u32| {
            if n == 0 {
                panic!("zero");
            }
            n
        });

        let _ = catch_unwind(AssertUnwindSafe(|| memo.call(0)));
        assert!(memo.gates.is_empty());
    }

    #[test]
    fn test_shared_across_threads() {
        let (f, calls) = counting(|n: u64| n * n);
        let memo = memoize(f);
        memo.call(3);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let memo = memo.clone();
                thread::spawn(move || memo.call(3))
            })
            .collect();

        for handle in handles {
            assert_eq!(handle.join().unwrap(), 9);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
