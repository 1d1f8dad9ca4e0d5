//! Cache configuration.
//!
//! `CacheConfig` gathers the two time-based knobs of the engine: how long
//! subscriber-free entries are retained, and when successful entries age
//! into staleness.

use std::time::Duration;

use fetchbox_core::RetentionPolicy;
use serde::{Deserialize, Serialize};

/// Behavior configuration for a [`QueryCache`](crate::QueryCache).
///
/// # Example
///
/// ```
/// use fetchbox::CacheConfig;
/// use fetchbox_core::RetentionPolicy;
/// use std::time::Duration;
///
/// let config = CacheConfig::builder()
///     .retention(RetentionPolicy::After(Duration::from_secs(60)))
///     .stale_after(Duration::from_secs(30))
///     .build();
/// ```
///
/// Deserializable from configuration files with humantime durations:
///
/// ```
/// # use fetchbox::CacheConfig;
/// let config: CacheConfig =
///     serde_json::from_str(r#"{"retention": {"after": "1m"}, "stale_after": "30s"}"#).unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct CacheConfig {
    /// What happens to an entry once its last subscriber disposes.
    #[serde(default)]
    pub retention: RetentionPolicy,
    /// Age at which a successful entry counts as stale, making the next
    /// bind refetch. `None` means entries only go stale through explicit
    /// invalidation.
    #[serde(default, with = "humantime_serde")]
    pub stale_after: Option<Duration>,
}

impl CacheConfig {
    /// Creates a builder with default settings.
    pub fn builder() -> CacheConfigBuilder {
        CacheConfigBuilder::default()
    }
}

/// Builder for [`CacheConfig`].
#[derive(Debug, Default)]
pub struct CacheConfigBuilder {
    retention: Option<RetentionPolicy>,
    stale_after: Option<Duration>,
}

impl CacheConfigBuilder {
    /// Sets the retention policy for subscriber-free entries.
    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Sets the staleness age for successful entries.
    pub fn stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = Some(stale_after);
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> CacheConfig {
        CacheConfig {
            retention: self.retention.unwrap_or_default(),
            stale_after: self.stale_after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let config = CacheConfig::builder().build();
        assert_eq!(config.retention, RetentionPolicy::default());
        assert_eq!(config.stale_after, None);
    }

    #[test]
    fn deserializes_from_json() {
        let config: CacheConfig =
            serde_json::from_str(r#"{"retention": "keep_forever", "stale_after": "45s"}"#).unwrap();
        assert_eq!(config.retention, RetentionPolicy::KeepForever);
        assert_eq!(config.stale_after, Some(Duration::from_secs(45)));
    }
}
