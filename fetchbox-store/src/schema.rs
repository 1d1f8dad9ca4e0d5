//! Typed row schemas validated at the store boundary.
//!
//! Rows cross the [`RemoteStore`](crate::RemoteStore) contract as JSON
//! values. This module is where they stop being opaque: every resource the
//! application reads declares a [`Schema`], and [`decode_rows`] converts
//! raw rows into typed records or rejects the whole read. Malformed remote
//! data therefore surfaces as a `Decode` rejection, never as untyped
//! payloads flowing through the cache.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{StoreError, StoreResult};

/// Declares the table and row shape of one remote resource.
///
/// # Example
///
/// ```
/// use fetchbox_store::Schema;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Serialize, Deserialize)]
/// struct Tenant {
///     id: String,
///     agency_id: String,
///     name: String,
/// }
///
/// struct Tenants;
///
/// impl Schema for Tenants {
///     const TABLE: &'static str = "tenants";
///     type Row = Tenant;
/// }
/// ```
pub trait Schema {
    /// Remote table backing this resource.
    const TABLE: &'static str;
    /// Validated row shape.
    type Row: Serialize + DeserializeOwned + Send;
}

/// Decodes raw store rows into the schema's row type.
///
/// Fails on the first malformed row with [`StoreError::Decode`], naming
/// the table and row position.
pub fn decode_rows<S: Schema>(rows: Vec<Value>) -> StoreResult<Vec<S::Row>> {
    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            serde_json::from_value(row).map_err(|err| {
                StoreError::Decode(format!("{} row {index}: {err}", S::TABLE))
            })
        })
        .collect()
}

/// Decodes exactly one row, mapping an empty result to `Rejected`.
///
/// For single-row reads ("fetch tenant by id"); the caller converts the
/// rejection into `NotFound` when the read is expected to hit.
pub fn decode_single<S: Schema>(rows: Vec<Value>) -> StoreResult<Option<S::Row>> {
    let mut decoded = decode_rows::<S>(rows)?;
    Ok(if decoded.is_empty() {
        None
    } else {
        Some(decoded.swap_remove(0))
    })
}

/// Encodes one typed row back into a store payload.
pub fn encode_row<S: Schema>(row: &S::Row) -> StoreResult<Value> {
    serde_json::to_value(row)
        .map_err(|err| StoreError::Decode(format!("{} encode: {err}", S::TABLE)))
}
