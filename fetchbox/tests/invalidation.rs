//! Tests for invalidation semantics.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fetchbox::predicate::Resource;
use fetchbox::{CacheConfig, QueryBinding, QueryCache, QueryStatus};
use fetchbox_core::{FetchError, Loader, QueryData, QueryKey};
use serde_json::json;

fn tenants_key() -> QueryKey {
    QueryKey::from_slice("tenants", &[("agency_id", Some("X"))])
}

fn counting_loader(counter: Arc<AtomicUsize>) -> impl Loader {
    move || {
        let counter = Arc::clone(&counter);
        async move {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            Ok(QueryData::new(json!([{"id": "1", "call": call}])))
        }
    }
}

/// Let spawned fetch drivers run to completion under paused time.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}

#[tokio::test(start_paused = true)]
async fn invalidate_without_subscribers_marks_but_does_not_fetch() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key();
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .fetch(key.clone(), counting_loader(Arc::clone(&calls)))
        .await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let matched = cache.invalidate(&Resource::new("tenants"));
    settle().await;

    assert_eq!(matched, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 1, "no subscriber, no refetch");
    let snapshot = cache.snapshot(&key).unwrap();
    assert!(snapshot.is_stale(), "entry must be marked for refetch-on-bind");
    assert!(snapshot.data().is_some(), "stale data is kept, not cleared");
}

#[tokio::test(start_paused = true)]
async fn invalidate_with_subscriber_fetches_exactly_once() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key();
    let calls = Arc::new(AtomicUsize::new(0));

    let binding = QueryBinding::bind(
        &cache,
        key.clone(),
        counting_loader(Arc::clone(&calls)),
        |_| {},
    );
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.invalidate(&Resource::new("tenants"));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2, "exactly one refetch");

    let snapshot = binding.snapshot();
    assert_eq!(snapshot.status(), QueryStatus::Success);
    assert!(!snapshot.is_stale());
}

#[tokio::test(start_paused = true)]
async fn stale_entry_refetches_on_next_bind() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key();
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .fetch(key.clone(), counting_loader(Arc::clone(&calls)))
        .await;
    cache.invalidate(&Resource::new("tenants"));
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // Binding to the stale entry triggers the deferred refetch.
    let _binding = QueryBinding::bind(
        &cache,
        key.clone(),
        counting_loader(Arc::clone(&calls)),
        |_| {},
    );
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidation_during_inflight_fetch_keeps_the_mark() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key();
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
    let inflight = tokio::spawn({
        let cache = cache.clone();
        let key = key.clone();
        async move { cache.fetch(key, slow).await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The write lands while the pre-write read is still in flight.
    assert_eq!(cache.invalidate(&Resource::new("tenants")), 1);
    let snapshot = inflight.await.unwrap();
    assert_eq!(snapshot.status(), QueryStatus::Success);

    // No subscriber, so no refetch - but the mark must survive the fetch
    // that started before the invalidation, or the next bind would serve
    // pre-write data without reloading.
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(cache.snapshot(&key).unwrap().is_stale());
}

#[tokio::test(start_paused = true)]
async fn error_does_not_poison_the_key() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key();
    let calls = Arc::new(AtomicUsize::new(0));

    let flaky = {
        let calls = Arc::clone(&calls);
        move || {
            let calls = Arc::clone(&calls);
            async move {
                if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(FetchError::NetworkFailure("connection reset".into()))
                } else {
                    Ok(QueryData::new(json!([{"id": "1"}])))
                }
            }
        }
    };

    let first = cache.fetch(key.clone(), flaky.clone()).await;
    assert_eq!(first.status(), QueryStatus::Error);

    cache.invalidate(&Resource::new("tenants"));
    settle().await;

    let second = cache.fetch(key.clone(), flaky).await;
    assert_eq!(second.status(), QueryStatus::Success);
    assert!(second.error().is_none());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn invalidation_is_scoped_by_predicate() {
    let cache = QueryCache::new(CacheConfig::default());
    let tenants = tenants_key();
    let leases = QueryKey::from_slice("leases", &[("agency_id", Some("X"))]);
    let calls = Arc::new(AtomicUsize::new(0));

    let _tenants_binding = QueryBinding::bind(
        &cache,
        tenants.clone(),
        counting_loader(Arc::clone(&calls)),
        |_| {},
    );
    let _leases_binding = QueryBinding::bind(
        &cache,
        leases.clone(),
        counting_loader(Arc::clone(&calls)),
        |_| {},
    );
    settle().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let matched = cache.invalidate(&Resource::new("tenants"));
    settle().await;

    assert_eq!(matched, 1);
    assert_eq!(calls.load(Ordering::SeqCst), 3, "only the tenants entry refetched");
    assert!(!cache.snapshot(&leases).unwrap().is_stale());
}
