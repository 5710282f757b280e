use memento_async::spawn_sweeper;
use memento_core::{CacheStore, ExpiringOptions, MemoizeOptions};
use serial_test::serial;
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration};

#[tokio::test]
#[serial]
async fn test_sweeper_removes_expired_entries() {
    let expired = Arc::new(Mutex::new(Vec::new()));
    let sink = expired.clone();
    let store = Arc::new(CacheStore::expiring(
        ExpiringOptions::new(Duration::from_millis(30)).on_expire(move |key: &String| {
            sink.lock().unwrap().push(key.clone());
        }),
    ));

    store.set("expire_soon".to_string(), 1);
    store.set_with_ttl("long_lived".to_string(), 2, Duration::from_secs(3600));

    let handle = spawn_sweeper(&store, Duration::from_millis(20));

    // Wait for the entry to expire and a sweep to run
    sleep(Duration::from_millis(120)).await;

    // Removed without any lookup
    assert_eq!(store.len(), 1);
    assert_eq!(*expired.lock().unwrap(), vec!["expire_soon".to_string()]);
    assert_eq!(store.get(&"long_lived".to_string()), Some(2));

    handle.abort();
}

#[tokio::test]
#[serial]
async fn test_sweeper_fires_on_expire_once() {
    let fired = Arc::new(Mutex::new(0));
    let counter = fired.clone();
    let square = MemoizeOptions::new()
        .expiring(
            ExpiringOptions::new(Duration::from_millis(20)).on_expire(move |_key: &i32| {
                *counter.lock().unwrap() += 1;
            }),
        )
        .build(|n: u32| n * n);

    square.call(3);
    let handle = spawn_sweeper(square.cache(), Duration::from_millis(10));

    sleep(Duration::from_millis(100)).await;
    assert!(square.cache().is_empty());

    // A later lookup must not report the same expiry again
    square.cache().purge_expired();
    assert_eq!(*fired.lock().unwrap(), 1);

    handle.abort();
}

#[tokio::test]
#[serial]
async fn test_sweeper_preserves_live_entries() {
    let store: Arc<CacheStore<u32, &str>> =
        Arc::new(CacheStore::expiring(ExpiringOptions::new(Duration::from_secs(60))));
    store.set(1, "value");

    let handle = spawn_sweeper(&store, Duration::from_millis(10));
    sleep(Duration::from_millis(50)).await;

    assert_eq!(store.get(&1), Some("value"));
    handle.abort();
}
