//! Tests for request collapsing and entry isolation.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use fetchbox::{CacheConfig, QueryCache, QueryStatus};
use fetchbox_core::{FetchError, Loader, QueryData, QueryKey};
use serde_json::{Value, json};

/// Loader that counts invocations and resolves with `payload` after `delay`.
fn slow_loader(counter: Arc<AtomicUsize>, payload: Value, delay: Duration) -> impl Loader {
    move || {
        let counter = Arc::clone(&counter);
        let payload = payload.clone();
        async move {
            counter.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(QueryData::new(payload))
        }
    }
}

fn tenants_key(agency: &str) -> QueryKey {
    QueryKey::from_slice("tenants", &[("agency_id", Some(agency))])
}

#[tokio::test(start_paused = true)]
async fn concurrent_fetches_run_loader_once() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key("X");
    let calls = Arc::new(AtomicUsize::new(0));
    let payload = json!([{"id": "1"}]);

    let first = cache.fetch(
        key.clone(),
        slow_loader(Arc::clone(&calls), payload.clone(), Duration::from_millis(50)),
    );
    let second = cache.fetch(
        key.clone(),
        slow_loader(Arc::clone(&calls), payload.clone(), Duration::from_millis(50)),
    );
    let (a, b) = tokio::join!(first, second);

    assert_eq!(calls.load(Ordering::SeqCst), 1, "loader must run exactly once");
    assert_eq!(a.status(), QueryStatus::Success);
    assert_eq!(b.status(), QueryStatus::Success);

    // Both callers hold the identical shared payload, not copies.
    let (da, db) = (a.data().unwrap(), b.data().unwrap());
    assert!(da.ptr_eq(db));
}

#[tokio::test(start_paused = true)]
async fn mid_flight_subscriber_receives_shared_outcome() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key("X");
    let calls = Arc::new(AtomicUsize::new(0));
    let loader = Arc::new(slow_loader(
        Arc::clone(&calls),
        json!([{"id": "1"}]),
        Duration::from_millis(50),
    )) as Arc<dyn Loader>;

    let early = tokio::spawn({
        let cache = cache.clone();
        let key = key.clone();
        let loader = Arc::clone(&loader);
        async move { cache.fetch_with(key, loader).await }
    });

    // A second caller arrives mid-flight.
    tokio::time::sleep(Duration::from_millis(10)).await;
    let late = cache.fetch_with(key.clone(), Arc::clone(&loader)).await;
    let early = early.await.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(early.data().unwrap().ptr_eq(late.data().unwrap()));
}

#[tokio::test(start_paused = true)]
async fn distinct_keys_never_interfere() {
    let cache = QueryCache::new(CacheConfig::default());

    let broken = cache
        .fetch(tenants_key("X"), || async {
            Err::<QueryData, _>(FetchError::NetworkFailure("connection refused".into()))
        })
        .await;
    let healthy = cache
        .fetch(tenants_key("Y"), || async {
            Ok(QueryData::new(json!([{"id": "2"}])))
        })
        .await;

    assert_eq!(broken.status(), QueryStatus::Error);
    assert_eq!(healthy.status(), QueryStatus::Success);
    assert!(healthy.error().is_none());

    // The failed key stays failed; the healthy key stays intact.
    let again = cache.snapshot(&tenants_key("Y")).unwrap();
    assert_eq!(again.status(), QueryStatus::Success);
}

#[tokio::test(start_paused = true)]
async fn success_implies_data_and_no_error() {
    let cache = QueryCache::new(CacheConfig::default());
    let key = tenants_key("X");

    // Observe the invariant at every transition, not just at the end.
    let _subscription = cache.subscribe(key.clone(), |snapshot| {
        if snapshot.status() == QueryStatus::Success {
            assert!(snapshot.data().is_some());
            assert!(snapshot.error().is_none());
        }
        if snapshot.status() == QueryStatus::Error {
            assert!(snapshot.error().is_some());
        }
    });

    cache
        .fetch(key.clone(), || async {
            Ok(QueryData::new(json!([{"id": "1"}])))
        })
        .await;
    cache
        .fetch(key.clone(), || async {
            Err::<QueryData, _>(FetchError::NetworkFailure("timeout".into()))
        })
        .await;
}
