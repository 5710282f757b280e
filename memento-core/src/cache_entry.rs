use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

static NEXT_ENTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Internal wrapper that tracks when a value was inserted into the cache and
/// how long it may live.
///
/// Each stored value is wrapped in a `CacheEntry` which records the insertion
/// timestamp using `Instant::now()`, an optional time-to-live, and a
/// process-unique `id`. The id lets late bookkeeping (such as the rejection
/// cleanup of a deferred value) act on the exact entry it was attached to and
/// leave a newer entry under the same key alone.
///
/// # Type Parameters
///
/// * `V` - The type of the cached value
///
/// # Examples
///
/// ```
/// use memento_core::CacheEntry;
/// use std::time::Duration;
///
/// let entry = CacheEntry::new(42, Some(Duration::from_secs(60)));
/// assert_eq!(entry.value, 42);
/// assert!(!entry.is_expired());
///
/// let immortal = CacheEntry::new("data", None);
/// assert!(!immortal.is_expired());
/// ```
#[derive(Clone, Debug)]
pub struct CacheEntry<V> {
    pub value: V,
    pub inserted_at: Instant,
    pub ttl: Option<Duration>,
    pub id: u64,
}

impl<V> CacheEntry<V> {
    /// Creates a new cache entry with the current timestamp and a fresh id.
    pub fn new(value: V, ttl: Option<Duration>) -> Self {
        Self::with_id(value, ttl, next_entry_id())
    }

    /// Creates a new cache entry with a previously reserved id.
    pub fn with_id(value: V, ttl: Option<Duration>, id: u64) -> Self {
        Self {
            value,
            inserted_at: Instant::now(),
            ttl,
            id,
        }
    }

    /// Returns true once the entry's age has reached its TTL.
    ///
    /// A TTL of zero is expired immediately. `None` never expires.
    ///
    /// # Examples
    ///
    /// ```
    /// use memento_core::CacheEntry;
    /// use std::time::Duration;
    ///
    /// let entry = CacheEntry::new("gone", Some(Duration::ZERO));
    /// assert!(entry.is_expired());
    /// ```
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }

    /// Same as [`is_expired`](Self::is_expired) against an explicit instant.
    pub fn is_expired_at(&self, now: Instant) -> bool {
        match self.ttl {
            Some(ttl) => now.saturating_duration_since(self.inserted_at) >= ttl,
            None => false,
        }
    }

    /// Time left before expiry; `None` when the entry never expires.
    pub fn remaining(&self) -> Option<Duration> {
        self.ttl
            .map(|ttl| ttl.saturating_sub(self.inserted_at.elapsed()))
    }
}

/// Reserves a process-unique entry id.
pub fn next_entry_id() -> u64 {
    NEXT_ENTRY_ID.fetch_add(1, Ordering::Relaxed)
}
