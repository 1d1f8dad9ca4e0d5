//! Query bindings: connecting a mount point to a cache entry.

use std::sync::Arc;

use fetchbox_core::{EntrySnapshot, FetchError, Loader, QueryKey};
use serde::de::DeserializeOwned;

use crate::cache::{QueryCache, Subscription};

/// A mount point's live view of one query.
///
/// Binding is the "hook" of this system: on creation it subscribes to the
/// entry and triggers a fetch only if the entry is idle or stale - never
/// while a fetch for the same key is already in flight. On drop it
/// unsubscribes without clearing data, so a rebind inside the retention
/// window renders warm from cache.
///
/// # Example
///
/// ```
/// use fetchbox::{CacheConfig, QueryCache, QueryBinding};
/// use fetchbox_core::{QueryData, QueryKey};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = QueryCache::new(CacheConfig::default());
/// let key = QueryKey::from_slice("tenants", &[("agency_id", Some("X"))]);
///
/// let binding = QueryBinding::bind(
///     &cache,
///     key,
///     || async { Ok(QueryData::new(json!([{"id": "1"}]))) },
///     |snapshot| {
///         // re-render with snapshot.status() / snapshot.data()
///         let _ = snapshot;
///     },
/// );
///
/// // Force a refresh regardless of freshness.
/// let snapshot = binding.refetch().await;
/// assert!(snapshot.data().is_some());
/// # }
/// ```
pub struct QueryBinding {
    cache: QueryCache,
    key: QueryKey,
    loader: Arc<dyn Loader>,
    subscription: Subscription,
}

impl std::fmt::Debug for QueryBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBinding")
            .field("key", &self.key)
            .field("disposed", &self.subscription.is_disposed())
            .finish()
    }
}

impl QueryBinding {
    /// Binds `on_change` to the entry for `key`, fetching through `loader`
    /// if the entry is idle or stale.
    pub fn bind(
        cache: &QueryCache,
        key: QueryKey,
        loader: impl Loader,
        on_change: impl Fn(EntrySnapshot) + Send + Sync + 'static,
    ) -> Self {
        let loader: Arc<dyn Loader> = Arc::new(loader);
        // Subscribe first: if the freshness fetch resolves instantly the
        // transition still reaches this binding.
        let subscription = cache.subscribe(key.clone(), on_change);
        cache.ensure_fresh(key.clone(), Arc::clone(&loader));
        QueryBinding {
            cache: cache.clone(),
            key,
            loader,
            subscription,
        }
    }

    /// Returns the key this binding observes.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns the current entry state.
    pub fn snapshot(&self) -> EntrySnapshot {
        self.cache.get_or_create(self.key.clone())
    }

    /// Forces a refetch, collapsing into an in-flight one if present.
    pub async fn refetch(&self) -> EntrySnapshot {
        self.cache
            .fetch_with(self.key.clone(), Arc::clone(&self.loader))
            .await
    }

    /// Decodes the current payload as typed rows, if data is present.
    pub fn rows<T: DeserializeOwned>(&self) -> Result<Option<Vec<T>>, FetchError> {
        self.snapshot().rows()
    }

    /// Unsubscribes now instead of at drop. Cached data stays behind for
    /// the retention window.
    pub fn dispose(self) {
        self.subscription.dispose();
    }
}
