#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

/// The query cache engine.
///
/// This module provides [`QueryCache`] - the process-wide keyed cache of
/// remote query state - together with [`Subscription`], the deterministic
/// disposer binding a mount point to an entry's updates. The engine
/// guarantees:
/// - **Request collapsing** - concurrent fetches of one key run the
///   loader exactly once and share the outcome
/// - **FIFO notification** - subscribers see each transition once, in
///   subscription order
/// - **Retention** - subscriber-free entries retire per
///   [`RetentionPolicy`](fetchbox_core::RetentionPolicy)
pub mod cache;

/// Cache configuration types.
///
/// Provides [`CacheConfig`] with retention and staleness settings,
/// builder-constructed or deserialized with humantime durations.
pub mod config;

/// Route guarding on session presence.
///
/// A two-state machine ([`guard::AuthState`]) deciding render vs redirect
/// for guarded paths, reading the session lazily and only when needed.
pub mod guard;

/// Mutations: remote writes followed by cache invalidation.
///
/// [`mutate`] and the [`Mutation`] builder restore cache consistency
/// after a write by invalidating the affected keys - on success only.
pub mod mutation;

/// Query bindings: connecting a mount point to a cache entry.
///
/// [`QueryBinding`] subscribes on creation, fetches only when idle or
/// stale, and unsubscribes on drop without discarding cached data.
pub mod query;

pub use cache::{QueryCache, Subscription};
pub use config::{CacheConfig, CacheConfigBuilder};
pub use guard::{AuthState, RouteDecision, RouteGuard};
pub use mutation::{Mutation, mutate};
pub use query::QueryBinding;

pub use fetchbox_core::{
    EntrySnapshot, FetchError, KeyPart, KeyParts, Loader, QueryData, QueryKey, QueryStatus,
    RetentionPolicy,
};

/// Invalidation predicates over query keys.
///
/// Re-exports from `fetchbox-core` including the [`KeyPredicate`] trait,
/// the [`Resource`]/[`Param`]/[`Exact`]/[`AnyKey`] matchers, and the
/// [`And`]/[`Or`]/[`Not`] combinators.
///
/// [`KeyPredicate`]: fetchbox_core::KeyPredicate
/// [`Resource`]: fetchbox_core::Resource
/// [`Param`]: fetchbox_core::Param
/// [`Exact`]: fetchbox_core::Exact
/// [`AnyKey`]: fetchbox_core::AnyKey
/// [`And`]: fetchbox_core::predicate::And
/// [`Or`]: fetchbox_core::predicate::Or
/// [`Not`]: fetchbox_core::predicate::Not
pub mod predicate {
    pub use fetchbox_core::predicate::{
        And, AnyKey, Exact, KeyPredicate, KeyPredicateExt, Not, Or, Param, Resource, combinators,
    };
}

/// The `fetchbox` prelude.
///
/// Provides convenient access to the most commonly used types:
///
/// ```rust
/// use fetchbox::prelude::*;
/// ```
pub mod prelude {
    pub use crate::predicate::{KeyPredicate, KeyPredicateExt};
    pub use crate::{
        CacheConfig, EntrySnapshot, FetchError, Mutation, QueryBinding, QueryCache, QueryKey,
        QueryStatus, mutate,
    };
}
