//! Subscription handles.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fetchbox_core::{EntrySnapshot, QueryKey};

use crate::cache::QueryCache;

/// Identifier of one subscriber within an entry.
pub(crate) type SubscriberId = u64;

/// Callback invoked on every state transition of a subscribed entry.
pub(crate) type SubscriberCallback = Arc<dyn Fn(EntrySnapshot) + Send + Sync>;

/// A live binding from one mount point to a cache entry.
///
/// Created by [`QueryCache::subscribe`]. Disposal is deterministic:
/// explicitly through [`Subscription::dispose`], or implicitly when the
/// handle drops. After disposal the callback is never invoked again, and
/// the entry's subscriber count decreases without clearing its data - a
/// remount inside the retention window rebinds warm.
#[derive(Debug)]
pub struct Subscription {
    cache: QueryCache,
    key: QueryKey,
    id: SubscriberId,
    disposed: AtomicBool,
}

impl Subscription {
    pub(crate) fn new(cache: QueryCache, key: QueryKey, id: SubscriberId) -> Self {
        Subscription {
            cache,
            key,
            id,
            disposed: AtomicBool::new(false),
        }
    }

    /// Returns the key this subscription is bound to.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Unsubscribes now instead of at drop.
    ///
    /// Idempotent: disposing twice (or dropping after disposing) detaches
    /// only once.
    pub fn dispose(&self) {
        if !self.disposed.swap(true, Ordering::AcqRel) {
            self.cache.unsubscribe(&self.key, self.id);
        }
    }

    /// Returns true once this subscription has been detached.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}
