#![warn(missing_docs)]
//! # fetchbox-store
//!
//! The Remote Store contract for the fetchbox query cache, plus an
//! in-memory reference implementation.
//!
//! The cache engine never issues network calls itself; everything it reads
//! or writes goes through the narrow [`RemoteStore`] trait defined here:
//!
//! - **Read** rows with [`Filter`]s and an optional [`Ordering`]
//! - **Write** rows with insert/update/delete
//! - **Authenticate** through the session primitive ([`Session`])
//!
//! Two pieces make the boundary safe and canonical:
//!
//! - [`schema`] validates rows into typed records the moment they cross
//!   the contract - malformed data becomes a rejection, not a payload.
//! - [`filter::query_key`] derives the cache key for a select from its
//!   filters, so bindings and invalidation predicates always agree on
//!   request fingerprints.

pub mod client;
pub mod error;
pub mod filter;
pub mod memory;
pub mod schema;
pub mod session;

pub use client::RemoteStore;
pub use error::{StoreError, StoreResult};
pub use filter::{Filter, FilterOp, Ordering, query_key};
pub use memory::MemoryStore;
pub use schema::{Schema, decode_rows, decode_single, encode_row};
pub use session::{Credentials, Session};
