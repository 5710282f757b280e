//! Background removal of expired cache entries.
//!
//! An expiring [`CacheStore`] only notices that an entry has expired when
//! someone looks it up. The sweeper purges expired entries on a fixed period
//! instead, so `on_expire` callbacks fire close to the actual expiry time and
//! stale values do not accumulate for keys that are never requested again.

use std::sync::Arc;
use std::time::Duration;

use memento_core::{CacheKey, CacheStore};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info};

/// Spawns a task that calls [`CacheStore::purge_expired`] every `period`.
///
/// The task holds only a weak reference and stops by itself once the store
/// is dropped. Abort the returned handle to stop it earlier. A zero period is
/// raised to one millisecond.
///
/// # Panics
///
/// Panics when called outside of a tokio runtime.
///
/// # Example
///
/// ```
/// use memento_async::spawn_sweeper;
/// use memento_core::MemoizeOptions;
/// use std::time::Duration;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let lookup = MemoizeOptions::new()
///     .ttl(Duration::from_secs(30))
///     .build(|id: u64| id * 2);
///
/// let sweeper = spawn_sweeper(lookup.cache(), Duration::from_secs(5));
/// // Later, during shutdown:
/// sweeper.abort();
/// # }
/// ```
pub fn spawn_sweeper<K, V>(store: &Arc<CacheStore<K, V>>, period: Duration) -> JoinHandle<()>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
{
    let store = Arc::downgrade(store);
    let period = period.max(Duration::from_millis(1));

    tokio::spawn(async move {
        info!(?period, "starting expired entry sweeper");

        let mut ticker = time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let Some(store) = store.upgrade() else {
                debug!("cache store dropped, stopping sweeper");
                break;
            };

            let removed = store.purge_expired();
            if removed > 0 {
                info!(removed, "sweeper removed expired entries");
            } else {
                debug!("sweeper found no expired entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use memento_core::ExpiringOptions;

    #[tokio::test]
    async fn test_sweeper_stops_when_store_dropped() {
        let store: Arc<CacheStore<u8, u8>> =
            Arc::new(CacheStore::expiring(ExpiringOptions::new(Duration::from_secs(1))));
        let handle = spawn_sweeper(&store, Duration::from_millis(10));

        drop(store);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }

    #[tokio::test]
    async fn test_sweeper_can_be_aborted() {
        let store: Arc<CacheStore<u8, u8>> = Arc::new(CacheStore::new());
        let handle = spawn_sweeper(&store, Duration::from_secs(60));

        handle.abort();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(handle.is_finished());
    }
}
