//! In-memory reference store.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};
use smol_str::SmolStr;
use tracing::debug;

use crate::client::RemoteStore;
use crate::error::{StoreError, StoreResult};
use crate::filter::{Filter, Ordering};
use crate::session::{Credentials, Session};

/// In-process [`RemoteStore`] implementation.
///
/// `MemoryStore` is the workspace's reference collaborator: integration
/// tests and demos run the full query/mutation pipeline against it without
/// a hosted backend. It evaluates filters and ordering with the same
/// semantics the contract promises, auto-assigns string `id`s on insert,
/// and keeps a single session slot fed by registered accounts.
///
/// # Caveats
///
/// - Data is **not persisted** - contents are lost when the store drops.
/// - Sign-in accepts only accounts registered via
///   [`MemoryStore::register_account`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: DashMap<SmolStr, Vec<Value>>,
    accounts: DashMap<String, String>,
    session: Mutex<Option<Session>>,
    id_counter: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store with no tables and no accounts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the named table if it does not exist yet.
    pub fn create_table(&self, table: impl Into<SmolStr>) {
        self.tables.entry(table.into()).or_default();
    }

    /// Registers an account accepted by [`RemoteStore::sign_in`].
    pub fn register_account(&self, email: impl Into<String>, password: impl Into<String>) {
        self.accounts.insert(email.into(), password.into());
    }

    /// Seeds a table with rows, creating it if needed.
    pub fn seed(&self, table: impl Into<SmolStr>, rows: Vec<Value>) {
        self.tables.entry(table.into()).or_default().extend(rows);
    }

    /// Number of rows currently stored in `table`.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, |rows| rows.len())
    }

    fn next_id(&self) -> String {
        let id = self.id_counter.fetch_add(1, AtomicOrdering::Relaxed) + 1;
        id.to_string()
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn select(
        &self,
        table: &str,
        filters: &[Filter],
        ordering: Option<&Ordering>,
    ) -> StoreResult<Vec<Value>> {
        let rows = self
            .tables
            .get(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_owned()))?;
        let mut matched: Vec<Value> = rows
            .iter()
            .filter(|row| filters.iter().all(|filter| filter.matches(row)))
            .cloned()
            .collect();
        if let Some(ordering) = ordering {
            matched.sort_by(|lhs, rhs| ordering.compare(lhs, rhs));
        }
        debug!(table, matched = matched.len(), "select");
        Ok(matched)
    }

    async fn insert(&self, table: &str, payload: Value) -> StoreResult<Value> {
        let mut row = match payload {
            Value::Object(map) => Value::Object(map),
            other => {
                return Err(StoreError::Rejected {
                    code: "invalid_payload".into(),
                    message: format!("expected object row, got {other}"),
                });
            }
        };
        if row.get("id").is_none() {
            row["id"] = json!(self.next_id());
        }
        let mut rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_owned()))?;
        rows.push(row.clone());
        debug!(table, "insert");
        Ok(row)
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        payload: Value,
    ) -> StoreResult<Vec<Value>> {
        let patch = match payload {
            Value::Object(map) => map,
            other => {
                return Err(StoreError::Rejected {
                    code: "invalid_payload".into(),
                    message: format!("expected object patch, got {other}"),
                });
            }
        };
        let mut rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_owned()))?;
        let mut updated = Vec::new();
        for row in rows.iter_mut() {
            if filters.iter().all(|filter| filter.matches(row))
                && let Value::Object(fields) = row
            {
                for (column, value) in &patch {
                    fields.insert(column.clone(), value.clone());
                }
                updated.push(row.clone());
            }
        }
        debug!(table, updated = updated.len(), "update");
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> StoreResult<u64> {
        let mut rows = self
            .tables
            .get_mut(table)
            .ok_or_else(|| StoreError::MissingTable(table.to_owned()))?;
        let before = rows.len();
        rows.retain(|row| !filters.iter().all(|filter| filter.matches(row)));
        let removed = (before - rows.len()) as u64;
        debug!(table, removed, "delete");
        Ok(removed)
    }

    fn session(&self) -> Option<Session> {
        let guard = self.session.lock().expect("session lock poisoned");
        guard.clone().filter(|session| !session.is_expired())
    }

    async fn sign_in(&self, credentials: Credentials) -> StoreResult<Session> {
        let known = self
            .accounts
            .get(&credentials.email)
            .is_some_and(|password| *password == credentials.password);
        if !known {
            return Err(StoreError::Rejected {
                code: "invalid_credentials".into(),
                message: "email or password did not match".into(),
            });
        }
        let session = Session::new(
            format!("mem-{}", self.next_id()),
            Some(Utc::now() + Duration::hours(1)),
        );
        *self.session.lock().expect("session lock poisoned") = Some(session.clone());
        debug!(email = %credentials.email, "sign_in");
        Ok(session)
    }

    async fn sign_out(&self) -> StoreResult<()> {
        *self.session.lock().expect("session lock poisoned") = None;
        debug!("sign_out");
        Ok(())
    }
}
