//! Tests for retention of subscriber-free entries.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fetchbox::{CacheConfig, QueryBinding, QueryCache, QueryStatus};
use fetchbox_core::{Loader, QueryData, QueryKey, RetentionPolicy};
use serde_json::json;

fn key() -> QueryKey {
    QueryKey::from_slice("apartments", &[("agency_id", Some("X"))])
}

fn counting_loader(counter: Arc<AtomicUsize>) -> impl Loader {
    move || {
        let counter = Arc::clone(&counter);
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(QueryData::new(json!([{"id": "1"}])))
        }
    }
}

fn cache_with(retention: RetentionPolicy) -> QueryCache {
    QueryCache::new(CacheConfig::builder().retention(retention).build())
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn evict_immediately_removes_on_last_unsubscribe() {
    let cache = cache_with(RetentionPolicy::EvictImmediately);
    let calls = Arc::new(AtomicUsize::new(0));

    let binding = QueryBinding::bind(&cache, key(), counting_loader(Arc::clone(&calls)), |_| {});
    settle().await;
    assert!(cache.contains(&key()));

    binding.dispose();
    assert!(!cache.contains(&key()), "entry must be gone immediately");
}

#[tokio::test(start_paused = true)]
async fn delayed_eviction_fires_after_the_window() {
    let cache = cache_with(RetentionPolicy::After(Duration::from_secs(60)));
    let calls = Arc::new(AtomicUsize::new(0));

    let binding = QueryBinding::bind(&cache, key(), counting_loader(Arc::clone(&calls)), |_| {});
    settle().await;
    binding.dispose();

    // Still warm inside the window.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(cache.contains(&key()));

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert!(!cache.contains(&key()), "window elapsed, entry must be gone");
}

#[tokio::test(start_paused = true)]
async fn remount_within_window_cancels_eviction_and_renders_warm() {
    let cache = cache_with(RetentionPolicy::After(Duration::from_secs(60)));
    let calls = Arc::new(AtomicUsize::new(0));

    let binding = QueryBinding::bind(&cache, key(), counting_loader(Arc::clone(&calls)), |_| {});
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    binding.dispose();

    tokio::time::sleep(Duration::from_secs(30)).await;

    // Remount inside the window: warm data, no fetch, eviction cancelled.
    let rebound = QueryBinding::bind(&cache, key(), counting_loader(Arc::clone(&calls)), |_| {});
    let snapshot = rebound.snapshot();
    assert_eq!(snapshot.status(), QueryStatus::Success);
    assert!(snapshot.data().is_some());
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1, "warm remount must not refetch");

    // The old timer fires into a resubscribed entry and must not evict.
    tokio::time::sleep(Duration::from_secs(40)).await;
    assert!(cache.contains(&key()));
}

#[tokio::test(start_paused = true)]
async fn keep_forever_never_evicts() {
    let cache = cache_with(RetentionPolicy::KeepForever);
    let calls = Arc::new(AtomicUsize::new(0));

    let binding = QueryBinding::bind(&cache, key(), counting_loader(Arc::clone(&calls)), |_| {});
    settle().await;
    binding.dispose();

    tokio::time::sleep(Duration::from_secs(24 * 60 * 60)).await;
    assert!(cache.contains(&key()));
}

#[tokio::test(start_paused = true)]
async fn unmount_mid_flight_lets_the_fetch_complete() {
    let cache = cache_with(RetentionPolicy::After(Duration::from_secs(60)));
    let calls = Arc::new(AtomicUsize::new(0));
    let slow = {
        let calls = Arc::clone(&calls);
        move || {
            let calls = Arc::clone(&calls);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(QueryData::new(json!([{"id": "1"}])))
            }
        }
    };

    let binding = QueryBinding::bind(&cache, key(), slow, |_| {});
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Last subscriber leaves mid-flight; the fetch is not cancelled.
    binding.dispose();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = cache.snapshot(&key()).expect("entry survives for fast remount");
    assert_eq!(snapshot.status(), QueryStatus::Success);
    assert!(snapshot.data().is_some());
}
