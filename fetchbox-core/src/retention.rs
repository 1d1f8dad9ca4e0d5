//! Retention policy for unsubscribed cache entries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What happens to a cache entry once its last subscriber disposes.
///
/// The data itself is never cleared on unsubscribe - a remount inside the
/// retention window reuses the cached payload instantly. The policy only
/// controls when a subscriber-free entry is removed from the table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    /// Remove the entry as soon as its subscriber count reaches zero.
    ///
    /// An in-flight fetch still completes and applies its outcome first.
    EvictImmediately,
    /// Keep the entry for the given window (e.g. "30s", "5m") after the
    /// last subscriber disposes, then remove it if still subscriber-free.
    After(#[serde(with = "humantime_serde")] Duration),
    /// Never remove subscriber-free entries.
    KeepForever,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::After(Duration::from_secs(300))
    }
}
