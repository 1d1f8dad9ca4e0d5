//! Loader contract for remote reads.

use futures::future::BoxFuture;

use crate::{FetchError, QueryData};

/// Outcome of one loader run.
pub type LoadResult = Result<QueryData, FetchError>;

/// Trait for producing the remote data behind a query key.
///
/// A loader is the upstream seam of the cache: the engine never talks to
/// the Remote Store directly, it runs the loader a binding supplied. The
/// engine stores loaders as `Arc<dyn Loader>` on entries so invalidation
/// can refetch without the original caller resupplying one, which is why
/// `load` borrows `&self` and returns an owned `'static` future.
///
/// # Examples
///
/// Any `Fn() -> Future` closure is a loader:
///
/// ```
/// use fetchbox_core::{Loader, QueryData};
/// use serde_json::json;
///
/// let loader = || async { Ok(QueryData::new(json!([{"id": "1"}]))) };
/// let _ = loader.load();
/// ```
pub trait Loader: Send + Sync + 'static {
    /// Starts one remote read and resolves with its outcome.
    ///
    /// Errors are returned, never panicked: the engine stores them on the
    /// entry and shares them with every collapsed caller.
    fn load(&self) -> BoxFuture<'static, LoadResult>;
}

impl<F, Fut> Loader for F
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = LoadResult> + Send + 'static,
{
    fn load(&self) -> BoxFuture<'static, LoadResult> {
        Box::pin((self)())
    }
}

impl Loader for std::sync::Arc<dyn Loader> {
    fn load(&self) -> BoxFuture<'static, LoadResult> {
        self.as_ref().load()
    }
}
