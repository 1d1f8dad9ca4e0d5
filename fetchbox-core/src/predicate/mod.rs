//! Invalidation predicates over query keys.
//!
//! This module provides the [`KeyPredicate`] trait used by cache
//! invalidation to select which entries a mutation affected.
//!
//! ## Overview
//!
//! A predicate inspects a [`QueryKey`] and answers whether the entry
//! behind it should be marked stale. Predicates never see payloads - they
//! match on the request fingerprint only, so matching is synchronous and
//! cheap enough to run against every entry in the table.
//!
//! ## Composability
//!
//! Predicates compose with logical combinators:
//!
//! - [`And`] - both predicates must match
//! - [`Or`] - either predicate matching is sufficient
//! - [`Not`] - inverts a predicate
//!
//! The [`KeyPredicateExt`] extension trait provides the fluent form:
//!
//! ```
//! use fetchbox_core::predicate::{KeyPredicate, KeyPredicateExt, Resource, Param};
//! use fetchbox_core::QueryKey;
//!
//! let affected = Resource::new("tenants").or(Param::new("leases", "tenant_id", "7"));
//!
//! let key = QueryKey::from_slice("tenants", &[("agency_id", Some("X"))]);
//! assert!(affected.matches(&key));
//! ```

pub mod combinators;

pub use combinators::{And, KeyPredicateExt, Not, Or};

use smol_str::SmolStr;

use crate::QueryKey;

/// Trait for selecting cache entries by their query key.
pub trait KeyPredicate: Send + Sync {
    /// Returns true when the entry behind `key` is affected.
    fn matches(&self, key: &QueryKey) -> bool;
}

impl<F> KeyPredicate for F
where
    F: Fn(&QueryKey) -> bool + Send + Sync,
{
    fn matches(&self, key: &QueryKey) -> bool {
        (self)(key)
    }
}

impl KeyPredicate for Box<dyn KeyPredicate> {
    fn matches(&self, key: &QueryKey) -> bool {
        self.as_ref().matches(key)
    }
}

impl<T> KeyPredicate for std::sync::Arc<T>
where
    T: KeyPredicate + ?Sized,
{
    fn matches(&self, key: &QueryKey) -> bool {
        self.as_ref().matches(key)
    }
}

/// Matches every key of one resource, regardless of parameters.
///
/// The usual choice after a write: any filtered view of the written table
/// may now be out of date.
#[derive(Debug, Clone)]
pub struct Resource {
    resource: SmolStr,
}

impl Resource {
    /// Creates a predicate matching all keys for `resource`.
    pub fn new(resource: impl Into<SmolStr>) -> Self {
        Self {
            resource: resource.into(),
        }
    }
}

impl KeyPredicate for Resource {
    fn matches(&self, key: &QueryKey) -> bool {
        key.resource() == self.resource
    }
}

/// Matches keys of one resource carrying a specific parameter value.
#[derive(Debug, Clone)]
pub struct Param {
    resource: SmolStr,
    name: SmolStr,
    value: SmolStr,
}

impl Param {
    /// Creates a predicate matching `resource` keys where param `name`
    /// equals `value`.
    pub fn new(
        resource: impl Into<SmolStr>,
        name: impl Into<SmolStr>,
        value: impl Into<SmolStr>,
    ) -> Self {
        Self {
            resource: resource.into(),
            name: name.into(),
            value: value.into(),
        }
    }
}

impl KeyPredicate for Param {
    fn matches(&self, key: &QueryKey) -> bool {
        key.resource() == self.resource && key.param(&self.name) == Some(self.value.as_str())
    }
}

/// Matches exactly one key.
#[derive(Debug, Clone)]
pub struct Exact {
    key: QueryKey,
}

impl Exact {
    /// Creates a predicate matching only `key`.
    pub fn new(key: QueryKey) -> Self {
        Self { key }
    }
}

impl KeyPredicate for Exact {
    fn matches(&self, key: &QueryKey) -> bool {
        &self.key == key
    }
}

/// Matches every key. Invalidate-the-world.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnyKey;

impl KeyPredicate for AnyKey {
    fn matches(&self, _key: &QueryKey) -> bool {
        true
    }
}
