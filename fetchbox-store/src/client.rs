//! The Remote Store contract.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreResult;
use crate::filter::{Filter, Ordering};
use crate::session::{Credentials, Session};

/// Thin handle to a hosted backend exposing table-scoped CRUD and a
/// session primitive.
///
/// This is the external collaborator seam of the whole workspace: loaders
/// and mutations depend only on this narrow contract, the transport behind
/// it is out of scope. Rows cross the boundary as JSON values; the typed
/// layer ([`crate::schema`]) validates them immediately on the caller's
/// side.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Reads rows from `table` matching all `filters`, optionally ordered.
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        ordering: Option<&Ordering>,
    ) -> StoreResult<Vec<Value>>;

    /// Inserts one row into `table` and returns the stored row.
    async fn insert(&self, table: &str, payload: Value) -> StoreResult<Value>;

    /// Updates rows of `table` matching `filters` with the fields of
    /// `payload`, returning the updated rows.
    async fn update(&self, table: &str, filters: &[Filter], payload: Value)
    -> StoreResult<Vec<Value>>;

    /// Deletes rows of `table` matching `filters`, returning how many were
    /// removed.
    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64>;

    /// Returns the current session, if one is active and unexpired.
    fn session(&self) -> Option<Session>;

    /// Exchanges credentials for a session.
    async fn sign_in(&self, credentials: Credentials) -> StoreResult<Session>;

    /// Discards the current session.
    async fn sign_out(&self) -> StoreResult<()>;
}

#[async_trait]
impl<T> RemoteStore for std::sync::Arc<T>
where
    T: RemoteStore + ?Sized,
{
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        ordering: Option<&Ordering>,
    ) -> StoreResult<Vec<Value>> {
        self.as_ref().select(table, filters, ordering).await
    }

    async fn insert(&self, table: &str, payload: Value) -> StoreResult<Value> {
        self.as_ref().insert(table, payload).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        payload: Value,
    ) -> StoreResult<Vec<Value>> {
        self.as_ref().update(table, filters, payload).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        self.as_ref().delete(table, filters).await
    }

    fn session(&self) -> Option<Session> {
        self.as_ref().session()
    }

    async fn sign_in(&self, credentials: Credentials) -> StoreResult<Session> {
        self.as_ref().sign_in(credentials).await
    }

    async fn sign_out(&self) -> StoreResult<()> {
        self.as_ref().sign_out().await
    }
}

#[async_trait]
impl RemoteStore for Box<dyn RemoteStore> {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        ordering: Option<&Ordering>,
    ) -> StoreResult<Vec<Value>> {
        (**self).select(table, filters, ordering).await
    }

    async fn insert(&self, table: &str, payload: Value) -> StoreResult<Value> {
        (**self).insert(table, payload).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        payload: Value,
    ) -> StoreResult<Vec<Value>> {
        (**self).update(table, filters, payload).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        (**self).delete(table, filters).await
    }

    fn session(&self) -> Option<Session> {
        (**self).session()
    }

    async fn sign_in(&self, credentials: Credentials) -> StoreResult<Session> {
        (**self).sign_in(credentials).await
    }

    async fn sign_out(&self) -> StoreResult<()> {
        (**self).sign_out().await
    }
}
