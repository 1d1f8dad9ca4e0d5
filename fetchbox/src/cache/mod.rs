//! The query cache engine.
//!
//! [`QueryCache`] is the single source of truth for in-flight and
//! completed remote reads. It deduplicates identical concurrent requests
//! (request collapsing), notifies subscribers on every state transition,
//! marks entries stale on invalidation, and retires subscriber-free
//! entries according to the configured [`RetentionPolicy`].
//!
//! ## Ownership
//!
//! The cache is an explicitly owned handle, not a process global: create
//! it at application start, clone the handle wherever bindings are made,
//! drop it at shutdown. Clones share one entry table.
//!
//! ## Sequencing
//!
//! Each entry is guarded by its own mutex; every transition of an entry is
//! serialized through that lock. Loaders run on detached tasks and are
//! never awaited under a lock. Subscriber callbacks run outside the lock:
//! each transition is captured into a per-entry queue while the lock is
//! held, and a single drainer per entry delivers them, so subscribers see
//! transitions in the order they happened, in subscription order within
//! each, at most once per transition.

mod subscription;

pub use subscription::Subscription;
pub(crate) use subscription::{SubscriberCallback, SubscriberId};

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use fetchbox_core::{
    EntrySnapshot, FetchError, KeyPredicate, Loader, QueryData, QueryKey, QueryStatus,
    RetentionPolicy,
};
use tokio::sync::watch;
use tracing::{Instrument, debug, debug_span, warn};

use crate::config::CacheConfig;

/// Shared outcome of one fetch, handed to every collapsed caller.
type FetchOutcome = Result<QueryData, Arc<FetchError>>;

/// Receiver half of the in-flight outcome channel. `None` until the driver
/// task applies the outcome to the entry.
type OutcomeRx = watch::Receiver<Option<FetchOutcome>>;

/// Mutable state of one cache entry.
struct EntrySlot {
    key: QueryKey,
    status: QueryStatus,
    data: Option<QueryData>,
    error: Option<Arc<FetchError>>,
    last_fetched_at: Option<DateTime<Utc>>,
    stale: bool,
    /// Bumped when a fetch starts; only the outcome of the matching fetch
    /// is applied, making the most recently started fetch authoritative.
    epoch: u64,
    /// Bumped on every subscribe; a scheduled eviction fires only if the
    /// generation is unchanged, so a remount cancels pending eviction.
    generation: u64,
    /// Last loader bound to this entry, re-run by invalidation refetch.
    loader: Option<Arc<dyn Loader>>,
    inflight: Option<OutcomeRx>,
    subscribers: Vec<(SubscriberId, SubscriberCallback)>,
    /// Transition notifications awaiting delivery, in transition order.
    pending: VecDeque<Notification>,
    /// True while some task is draining `pending` for this entry.
    dispatching: bool,
}

impl EntrySlot {
    fn new(key: QueryKey) -> Self {
        EntrySlot {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            stale: false,
            epoch: 0,
            generation: 0,
            loader: None,
            inflight: None,
            subscribers: Vec::new(),
            pending: VecDeque::new(),
            dispatching: false,
        }
    }

    /// Whether the entry counts as stale, either by explicit invalidation
    /// or by age.
    fn is_stale(&self, stale_after: Option<std::time::Duration>) -> bool {
        if self.stale {
            return true;
        }
        match (stale_after, self.last_fetched_at) {
            (Some(age), Some(at)) => {
                at + chrono::Duration::from_std(age).unwrap_or(chrono::Duration::zero())
                    <= Utc::now()
            }
            _ => false,
        }
    }

    fn snapshot(&self, stale_after: Option<std::time::Duration>) -> EntrySnapshot {
        match self.status {
            QueryStatus::Idle => EntrySnapshot::idle(self.key.clone()),
            QueryStatus::Loading => EntrySnapshot::loading(self.key.clone(), self.data.clone()),
            QueryStatus::Success => EntrySnapshot::success(
                self.key.clone(),
                self.data.clone().expect("success entry without data"),
                self.last_fetched_at.expect("success entry without timestamp"),
                self.is_stale(stale_after),
            ),
            QueryStatus::Error => EntrySnapshot::errored(
                self.key.clone(),
                self.error.clone().expect("error entry without error"),
                self.data.clone(),
            ),
        }
    }

    /// Queues a notification for the current state.
    ///
    /// Captured under the entry lock so delivery order matches transition
    /// order. Returns true when the caller became the drainer and must
    /// call [`QueryCache::drain_notifications`] after releasing the lock.
    fn enqueue_notification(&mut self, stale_after: Option<std::time::Duration>) -> bool {
        self.pending.push_back(Notification {
            snapshot: self.snapshot(stale_after),
            callbacks: self
                .subscribers
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .collect(),
        });
        if self.dispatching {
            false
        } else {
            self.dispatching = true;
            true
        }
    }
}

struct Notification {
    snapshot: EntrySnapshot,
    callbacks: Vec<SubscriberCallback>,
}

impl Notification {
    /// Invokes the captured callbacks in subscription order.
    fn dispatch(self) {
        for callback in self.callbacks {
            callback(self.snapshot.clone());
        }
    }
}

struct QueryCacheInner {
    config: CacheConfig,
    entries: DashMap<QueryKey, Arc<Mutex<EntrySlot>>>,
    subscriber_counter: AtomicU64,
}

/// Process-wide keyed cache of remote query state.
///
/// See the [module docs](crate::cache) for the ownership and sequencing
/// model. All methods take `&self`; the handle is `Clone` and clones share
/// one entry table.
///
/// # Example
///
/// ```
/// use fetchbox::{CacheConfig, QueryCache};
/// use fetchbox_core::{QueryData, QueryKey};
/// use serde_json::json;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let cache = QueryCache::new(CacheConfig::default());
/// let key = QueryKey::from_slice("tenants", &[("agency_id", Some("X"))]);
///
/// let snapshot = cache
///     .fetch(key.clone(), || async {
///         Ok(QueryData::new(json!([{"id": "1"}])))
///     })
///     .await;
/// assert!(snapshot.data().is_some());
/// # }
/// ```
#[derive(Clone)]
pub struct QueryCache {
    inner: Arc<QueryCacheInner>,
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.inner.entries.len())
            .field("config", &self.inner.config)
            .finish()
    }
}

impl QueryCache {
    /// Creates an empty cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        QueryCache {
            inner: Arc::new(QueryCacheInner {
                config,
                entries: DashMap::new(),
                subscriber_counter: AtomicU64::new(0),
            }),
        }
    }

    /// Returns the configuration this cache was created with.
    pub fn config(&self) -> &CacheConfig {
        &self.inner.config
    }

    /// Returns the entry for `key`, allocating an idle one if absent.
    ///
    /// No side effect beyond allocation - never triggers a fetch.
    pub fn get_or_create(&self, key: QueryKey) -> EntrySnapshot {
        let slot = self.slot(key);
        let entry = lock(&slot);
        entry.snapshot(self.stale_after())
    }

    /// Returns the entry snapshot for `key` without allocating.
    pub fn snapshot(&self, key: &QueryKey) -> Option<EntrySnapshot> {
        let slot = self.inner.entries.get(key)?.clone();
        let entry = lock(&slot);
        Some(entry.snapshot(self.stale_after()))
    }

    /// Number of entries currently in the table.
    pub fn len(&self) -> usize {
        self.inner.entries.len()
    }

    /// Returns true when the table holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.entries.is_empty()
    }

    /// Returns true when an entry exists for `key`.
    pub fn contains(&self, key: &QueryKey) -> bool {
        self.inner.entries.contains_key(key)
    }

    /// Number of live subscribers on the entry for `key`.
    pub fn subscriber_count(&self, key: &QueryKey) -> usize {
        self.inner
            .entries
            .get(key)
            .map_or(0, |slot| lock(slot.value()).subscribers.len())
    }

    /// Fetches `key` through `loader`, collapsing concurrent requests.
    ///
    /// If a fetch for this key is already in flight, no second loader run
    /// starts - the call awaits the shared outcome. Otherwise the entry
    /// transitions to `Loading` and the loader runs on a detached task, so
    /// it completes and updates the entry even if every waiter is dropped
    /// mid-flight.
    ///
    /// Loader failures are stored on the entry, never rethrown: the
    /// returned snapshot carries them as [`EntrySnapshot::error`] state.
    pub async fn fetch(&self, key: QueryKey, loader: impl Loader) -> EntrySnapshot {
        self.fetch_with(key, Arc::new(loader)).await
    }

    /// [`fetch`](QueryCache::fetch) with an already-shared loader.
    pub async fn fetch_with(&self, key: QueryKey, loader: Arc<dyn Loader>) -> EntrySnapshot {
        let slot = self.slot(key.clone());
        let (mut rx, drain) = {
            let mut entry = lock(&slot);
            entry.loader = Some(Arc::clone(&loader));
            match entry.inflight.clone() {
                Some(rx) => {
                    debug!(key = %key, "fetch collapsed into in-flight request");
                    (rx, false)
                }
                None => self.begin_fetch(&mut entry),
            }
        };
        if drain {
            self.drain_notifications(&slot);
        }

        // Await the shared outcome; the driver task applies it to the
        // entry before publishing, so the snapshot below is post-outcome.
        loop {
            if rx.borrow().is_some() {
                break;
            }
            if rx.changed().await.is_err() {
                break;
            }
        }
        match self.snapshot(&key) {
            Some(snapshot) => snapshot,
            // Entry already evicted (immediate retention, zero
            // subscribers): answer from the shared outcome instead.
            None => match rx.borrow().clone() {
                Some(Ok(data)) => EntrySnapshot::success(key, data, Utc::now(), false),
                Some(Err(error)) => EntrySnapshot::errored(key, error, None),
                None => EntrySnapshot::idle(key),
            },
        }
    }

    /// Registers `callback` to run on every state transition of `key`.
    ///
    /// Notifications are FIFO in subscription order, at most one per
    /// transition, and stop the moment the returned [`Subscription`] is
    /// disposed. Subscribing allocates the entry if needed and cancels any
    /// pending eviction.
    pub fn subscribe(
        &self,
        key: QueryKey,
        callback: impl Fn(EntrySnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self
            .inner
            .subscriber_counter
            .fetch_add(1, AtomicOrdering::Relaxed);
        let slot = self.slot(key.clone());
        {
            let mut entry = lock(&slot);
            entry.generation += 1;
            entry.subscribers.push((id, Arc::new(callback)));
        }
        debug!(key = %key, subscriber = id, "subscribed");
        Subscription::new(self.clone(), key, id)
    }

    /// Marks every entry matching `predicate` stale.
    ///
    /// Entries with at least one live subscriber and a remembered loader
    /// refetch immediately (exactly one fetch each); subscriber-free
    /// entries stay marked and refetch on their next bind. Returns how
    /// many entries matched.
    pub fn invalidate(&self, predicate: &dyn KeyPredicate) -> usize {
        let matched: Vec<Arc<Mutex<EntrySlot>>> = self
            .inner
            .entries
            .iter()
            .filter(|entry| predicate.matches(entry.key()))
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut to_drain = Vec::new();
        for slot in &matched {
            let mut entry = lock(slot);
            entry.stale = true;
            let live = !entry.subscribers.is_empty();
            if live && entry.loader.is_some() {
                // Refetch now; the epoch bump makes this fetch
                // authoritative over any outcome still in flight.
                let (_rx, drain) = self.begin_fetch(&mut entry);
                if drain {
                    to_drain.push(Arc::clone(slot));
                }
            }
        }
        for slot in to_drain {
            self.drain_notifications(&slot);
        }
        debug!(matched = matched.len(), "invalidated");
        matched.len()
    }

    /// Binds a loader to `key` and refetches if the entry is idle or
    /// stale.
    ///
    /// This is the mount-time path of a query binding: it never starts a
    /// second fetch while one is in flight, and it leaves fresh entries
    /// untouched (warm re-render). Returns true when a fetch was started.
    pub fn ensure_fresh(&self, key: QueryKey, loader: Arc<dyn Loader>) -> bool {
        let slot = self.slot(key);
        let drain = {
            let mut entry = lock(&slot);
            entry.loader = Some(loader);
            if entry.inflight.is_some() {
                return false;
            }
            let wants_fetch = matches!(entry.status, QueryStatus::Idle)
                || entry.is_stale(self.stale_after());
            if !wants_fetch {
                return false;
            }
            let (_rx, drain) = self.begin_fetch(&mut entry);
            drain
        };
        if drain {
            self.drain_notifications(&slot);
        }
        true
    }

    /// Starts a fetch for the locked entry and returns the outcome channel
    /// plus whether the caller must drain the notification queue after
    /// releasing the entry lock.
    ///
    /// Caller must have stored a loader on the entry.
    fn begin_fetch(&self, entry: &mut EntrySlot) -> (OutcomeRx, bool) {
        let loader = Arc::clone(
            entry
                .loader
                .as_ref()
                .expect("begin_fetch on entry without loader"),
        );
        entry.epoch += 1;
        entry.status = QueryStatus::Loading;
        entry.error = None;
        entry.stale = false;

        let (tx, rx) = watch::channel(None);
        entry.inflight = Some(rx.clone());

        let epoch = entry.epoch;
        let key = entry.key.clone();
        let cache = self.clone();
        let span = debug_span!("fetch", key = %key, epoch);
        tokio::spawn(
            async move {
                let outcome: FetchOutcome = loader.load().await.map_err(Arc::new);
                if let Err(error) = &outcome {
                    warn!(key = %key, kind = error.kind(), "loader failed");
                }
                cache.apply_outcome(&key, epoch, outcome.clone());
                // Publish after applying, so awaiting callers observe the
                // updated entry.
                let _ = tx.send(Some(outcome));
            }
            .instrument(span),
        );

        let drain = entry.enqueue_notification(self.stale_after());
        (rx, drain)
    }

    /// Applies a completed fetch outcome to its entry.
    fn apply_outcome(&self, key: &QueryKey, epoch: u64, outcome: FetchOutcome) {
        let Some(slot) = self.inner.entries.get(key).map(|s| Arc::clone(s.value())) else {
            return;
        };
        let drain = {
            let mut entry = lock(&slot);
            if entry.epoch != epoch {
                debug!(key = %key, epoch, "discarding superseded fetch outcome");
                return;
            }
            entry.inflight = None;
            match outcome {
                Ok(data) => {
                    entry.status = QueryStatus::Success;
                    entry.data = Some(data);
                    entry.error = None;
                    entry.last_fetched_at = Some(Utc::now());
                    // Staleness is cleared when a fetch starts, not here:
                    // an invalidation that landed mid-flight keeps its mark.
                }
                Err(error) => {
                    entry.status = QueryStatus::Error;
                    entry.error = Some(error);
                }
            }
            entry.enqueue_notification(self.stale_after())
        };
        if drain {
            self.drain_notifications(&slot);
        }
        self.retire_if_abandoned(key);
    }

    /// Delivers queued notifications for one entry until the queue is
    /// empty. At most one drainer runs per entry, so transitions reach
    /// subscribers in the order they happened.
    fn drain_notifications(&self, slot: &Arc<Mutex<EntrySlot>>) {
        loop {
            let notification = {
                let mut entry = lock(slot);
                match entry.pending.pop_front() {
                    Some(notification) => notification,
                    None => {
                        entry.dispatching = false;
                        return;
                    }
                }
            };
            notification.dispatch();
        }
    }

    pub(crate) fn unsubscribe(&self, key: &QueryKey, id: SubscriberId) {
        let Some(slot) = self.inner.entries.get(key).map(|s| Arc::clone(s.value())) else {
            return;
        };
        let (now_empty, generation) = {
            let mut entry = lock(&slot);
            entry.subscribers.retain(|(sub_id, _)| *sub_id != id);
            (entry.subscribers.is_empty(), entry.generation)
        };
        debug!(key = %key, subscriber = id, "unsubscribed");
        if now_empty {
            self.schedule_eviction(key.clone(), generation);
        }
    }

    /// Runs the retention policy after the last subscriber of `key` left.
    fn schedule_eviction(&self, key: QueryKey, generation: u64) {
        match self.inner.config.retention {
            RetentionPolicy::EvictImmediately => {
                self.evict_if_idle(&key, generation);
            }
            RetentionPolicy::After(window) => {
                let cache = self.clone();
                let span = debug_span!("evict", key = %key, generation);
                tokio::spawn(
                    async move {
                        tokio::time::sleep(window).await;
                        cache.evict_if_idle(&key, generation);
                    }
                    .instrument(span),
                );
            }
            RetentionPolicy::KeepForever => {}
        }
    }

    /// Removes the entry for `key` if it is still subscriber-free, not in
    /// flight, and untouched since the eviction was scheduled.
    fn evict_if_idle(&self, key: &QueryKey, generation: u64) {
        let Some(slot) = self.inner.entries.get(key).map(|s| Arc::clone(s.value())) else {
            return;
        };
        let evict = {
            let entry = lock(&slot);
            entry.subscribers.is_empty()
                && entry.generation == generation
                && entry.inflight.is_none()
        };
        if evict {
            self.inner.entries.remove(key);
            debug!(key = %key, "evicted");
        }
    }

    /// Re-runs the retention decision after a fetch completed, covering
    /// entries whose last subscriber left mid-flight.
    fn retire_if_abandoned(&self, key: &QueryKey) {
        let Some(slot) = self.inner.entries.get(key).map(|s| Arc::clone(s.value())) else {
            return;
        };
        let generation = {
            let entry = lock(&slot);
            // Entries that never had a subscriber are plain fetch results;
            // retention is a subscription-lifecycle concern.
            if !entry.subscribers.is_empty() || entry.generation == 0 {
                return;
            }
            entry.generation
        };
        self.schedule_eviction(key.clone(), generation);
    }

    fn slot(&self, key: QueryKey) -> Arc<Mutex<EntrySlot>> {
        self.inner
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(EntrySlot::new(key))))
            .clone()
    }

    fn stale_after(&self) -> Option<std::time::Duration> {
        self.inner.config.stale_after
    }
}

fn lock(slot: &Arc<Mutex<EntrySlot>>) -> MutexGuard<'_, EntrySlot> {
    slot.lock().expect("entry lock poisoned")
}
