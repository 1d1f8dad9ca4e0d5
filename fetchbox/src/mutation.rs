//! Mutations: remote writes followed by cache invalidation.
//!
//! A mutation is a plain asynchronous write against the Remote Store. The
//! cache is not write-through: after a successful write the affected
//! entries are merely marked stale (and refetched where subscribed), so
//! the next render shows post-write data without manual reload.
//!
//! On failure nothing is invalidated and the error propagates to the
//! caller for UI-level reporting. There is no automatic retry and no
//! idempotency token: a write lost to a transient network failure is the
//! caller's to resubmit.

use fetchbox_core::{FetchError, KeyPredicate};
use tracing::debug;

use crate::cache::QueryCache;

/// Runs `writer`, then invalidates every entry matched by `affected`.
///
/// # Example
///
/// ```
/// use fetchbox::{mutate, CacheConfig, QueryCache};
/// use fetchbox_core::predicate::{KeyPredicate, Resource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), fetchbox_core::FetchError> {
/// let cache = QueryCache::new(CacheConfig::default());
/// let affected: Vec<Box<dyn KeyPredicate>> = vec![Box::new(Resource::new("tenants"))];
///
/// mutate(&cache, async { Ok(()) }, &affected).await?;
/// # Ok(())
/// # }
/// ```
pub async fn mutate<T, W>(
    cache: &QueryCache,
    writer: W,
    affected: &[Box<dyn KeyPredicate>],
) -> Result<T, FetchError>
where
    W: Future<Output = Result<T, FetchError>>,
{
    let value = writer.await?;
    let mut invalidated = 0;
    for predicate in affected {
        invalidated += cache.invalidate(predicate.as_ref());
    }
    debug!(predicates = affected.len(), invalidated, "mutation applied");
    Ok(value)
}

/// Builder collecting the affected-key predicates of one mutation.
///
/// ```
/// use fetchbox::{CacheConfig, Mutation, QueryCache};
/// use fetchbox_core::predicate::{Param, Resource};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), fetchbox_core::FetchError> {
/// let cache = QueryCache::new(CacheConfig::default());
///
/// Mutation::new(&cache)
///     .invalidates(Resource::new("tenants"))
///     .invalidates(Param::new("leases", "agency_id", "X"))
///     .run(async { Ok(()) })
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct Mutation<'cache> {
    cache: &'cache QueryCache,
    affected: Vec<Box<dyn KeyPredicate>>,
}

impl std::fmt::Debug for Mutation<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mutation")
            .field("affected", &self.affected.len())
            .finish()
    }
}

impl<'cache> Mutation<'cache> {
    /// Starts a mutation against `cache` with an empty affected set.
    pub fn new(cache: &'cache QueryCache) -> Self {
        Mutation {
            cache,
            affected: Vec::new(),
        }
    }

    /// Adds a predicate selecting entries this write affects.
    pub fn invalidates(mut self, predicate: impl KeyPredicate + 'static) -> Self {
        self.affected.push(Box::new(predicate));
        self
    }

    /// Runs the writer; invalidates the affected set only on success.
    pub async fn run<T, W>(self, writer: W) -> Result<T, FetchError>
    where
        W: Future<Output = Result<T, FetchError>>,
    {
        mutate(self.cache, writer, &self.affected).await
    }
}
