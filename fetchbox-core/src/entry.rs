//! Cache entry state types.
//!
//! This module provides the observable state of one cache entry:
//!
//! - [`QueryStatus`] - the entry lifecycle phase (idle, loading, success, error)
//! - [`QueryData`] - the erased, cheaply cloneable query payload
//! - [`EntrySnapshot`] - an immutable view of one entry, handed to subscribers
//!
//! ## Invariants
//!
//! Snapshots uphold the entry invariants at every observation point:
//!
//! - `Success` implies data is present and error is absent.
//! - `Error` implies error is present; data is the last successful payload
//!   or absent.
//!
//! The constructors on [`EntrySnapshot`] are the only way the engine builds
//! snapshots, so a violating combination cannot be observed.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;

use crate::FetchError;
use crate::QueryKey;

/// Lifecycle phase of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    /// Entry allocated, no fetch started yet.
    #[default]
    Idle,
    /// A fetch is in flight for this entry.
    Loading,
    /// The most recent fetch resolved with data.
    Success,
    /// The most recent fetch failed; see the entry error.
    Error,
}

impl QueryStatus {
    /// Returns the status as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Idle => "idle",
            QueryStatus::Loading => "loading",
            QueryStatus::Success => "success",
            QueryStatus::Error => "error",
        }
    }
}

/// Erased query payload.
///
/// Wraps the decoded JSON rows in an [`Arc`] so every collapsed caller and
/// every subscriber observes the identical payload, and cloning a snapshot
/// never copies row data. Typed access goes through [`QueryData::rows`],
/// which re-validates against the requested row type.
#[derive(Debug, Clone)]
pub struct QueryData(Arc<Value>);

impl QueryData {
    /// Wraps an already-decoded JSON payload.
    pub fn new(value: Value) -> Self {
        QueryData(Arc::new(value))
    }

    /// Returns the raw JSON payload.
    pub fn value(&self) -> &Value {
        &self.0
    }

    /// Returns true iff `other` is the same shared allocation.
    ///
    /// Collapsed fetches hand the same allocation to every caller; tests
    /// use this to assert the single-flight property.
    pub fn ptr_eq(&self, other: &QueryData) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Decodes the payload as a list of typed rows.
    ///
    /// A payload that does not match `T` is a [`FetchError::RemoteRejection`]:
    /// malformed remote data never surfaces as untyped rows.
    pub fn rows<T: DeserializeOwned>(&self) -> Result<Vec<T>, FetchError> {
        serde_json::from_value(Value::clone(&self.0))
            .map_err(|err| FetchError::RemoteRejection(format!("row decode: {err}")))
    }
}

impl PartialEq for QueryData {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0 == other.0
    }
}

impl From<Value> for QueryData {
    fn from(value: Value) -> Self {
        QueryData::new(value)
    }
}

/// Immutable view of one cache entry.
///
/// This is what subscribers receive on every state transition and what
/// the cache returns to fetch callers. Cloning is cheap: the key, data,
/// and error are all reference-counted.
#[derive(Debug, Clone)]
pub struct EntrySnapshot {
    key: QueryKey,
    status: QueryStatus,
    data: Option<QueryData>,
    error: Option<Arc<FetchError>>,
    last_fetched_at: Option<DateTime<Utc>>,
    stale: bool,
}

impl EntrySnapshot {
    /// Snapshot of a freshly allocated entry.
    pub fn idle(key: QueryKey) -> Self {
        EntrySnapshot {
            key,
            status: QueryStatus::Idle,
            data: None,
            error: None,
            last_fetched_at: None,
            stale: false,
        }
    }

    /// Snapshot of an entry with a fetch in flight.
    ///
    /// `data` carries the previous successful payload, if any, so
    /// subscribers can keep rendering it while the refresh runs.
    pub fn loading(key: QueryKey, data: Option<QueryData>) -> Self {
        EntrySnapshot {
            key,
            status: QueryStatus::Loading,
            data,
            error: None,
            last_fetched_at: None,
            stale: false,
        }
    }

    /// Snapshot of an entry whose fetch resolved with data.
    pub fn success(
        key: QueryKey,
        data: QueryData,
        last_fetched_at: DateTime<Utc>,
        stale: bool,
    ) -> Self {
        EntrySnapshot {
            key,
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            last_fetched_at: Some(last_fetched_at),
            stale,
        }
    }

    /// Snapshot of an entry whose fetch failed.
    ///
    /// `data` is the last successful payload, if one exists.
    pub fn errored(key: QueryKey, error: Arc<FetchError>, data: Option<QueryData>) -> Self {
        EntrySnapshot {
            key,
            status: QueryStatus::Error,
            data,
            error: Some(error),
            last_fetched_at: None,
            stale: false,
        }
    }

    /// Returns the key this snapshot describes.
    pub fn key(&self) -> &QueryKey {
        &self.key
    }

    /// Returns the entry status.
    pub fn status(&self) -> QueryStatus {
        self.status
    }

    /// Returns the payload, present for `Success` and optionally retained
    /// through `Loading` and `Error`.
    pub fn data(&self) -> Option<&QueryData> {
        self.data.as_ref()
    }

    /// Returns the stored failure, present iff the status is `Error`.
    pub fn error(&self) -> Option<&Arc<FetchError>> {
        self.error.as_ref()
    }

    /// Returns when the payload was last fetched successfully.
    pub fn last_fetched_at(&self) -> Option<DateTime<Utc>> {
        self.last_fetched_at
    }

    /// Returns true when the entry has been invalidated (or aged) and the
    /// next bind should refetch.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Decodes the payload as typed rows, if data is present.
    pub fn rows<T: DeserializeOwned>(&self) -> Result<Option<Vec<T>>, FetchError> {
        self.data.as_ref().map(QueryData::rows).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn success_snapshot_upholds_invariant() {
        let key = QueryKey::resource_only("tenants");
        let snap = EntrySnapshot::success(key, QueryData::new(json!([{"id": "1"}])), Utc::now(), false);
        assert_eq!(snap.status(), QueryStatus::Success);
        assert!(snap.data().is_some());
        assert!(snap.error().is_none());
    }

    #[test]
    fn error_snapshot_keeps_last_data() {
        let key = QueryKey::resource_only("tenants");
        let previous = QueryData::new(json!([{"id": "1"}]));
        let snap = EntrySnapshot::errored(
            key,
            Arc::new(FetchError::NetworkFailure("timeout".into())),
            Some(previous.clone()),
        );
        assert_eq!(snap.status(), QueryStatus::Error);
        assert!(snap.error().is_some());
        assert!(snap.data().is_some_and(|d| d.ptr_eq(&previous)));
    }

    #[test]
    fn rows_decode_and_reject() {
        #[derive(Debug, serde::Deserialize)]
        struct Row {
            id: String,
        }

        let ok = QueryData::new(json!([{"id": "1"}, {"id": "2"}]));
        let rows: Vec<Row> = ok.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].id, "1");

        let malformed = QueryData::new(json!([{"id": 7}]));
        let err = malformed.rows::<Row>().unwrap_err();
        assert!(matches!(err, FetchError::RemoteRejection(_)));
    }
}
