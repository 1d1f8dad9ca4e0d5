#![warn(missing_docs)]
//! # fetchbox-core
//!
//! Core types for the fetchbox asynchronous remote-query cache.
//!
//! This crate provides the foundational abstractions shared by the cache
//! engine (`fetchbox`) and the store contract (`fetchbox-store`). It
//! defines what a query *is* without saying anything about how it is
//! executed or stored:
//!
//! - **Identify** queries ([`QueryKey`], [`KeyPart`])
//! - **Observe** entry state ([`EntrySnapshot`], [`QueryStatus`], [`QueryData`])
//! - **Classify** failures ([`FetchError`])
//! - **Select** entries for invalidation ([`predicate::KeyPredicate`])
//! - **Run** remote reads ([`Loader`])
//! - **Retain** unsubscribed entries ([`RetentionPolicy`])

pub mod entry;
pub mod error;
pub mod key;
pub mod loader;
pub mod predicate;
pub mod retention;

pub use entry::{EntrySnapshot, QueryData, QueryStatus};
pub use error::FetchError;
pub use key::{KeyPart, KeyParts, QueryKey};
pub use loader::{LoadResult, Loader};
pub use predicate::{AnyKey, Exact, KeyPredicate, KeyPredicateExt, Param, Resource};
pub use retention::RetentionPolicy;
