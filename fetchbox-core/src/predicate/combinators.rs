//! Logical combinators for composing key predicates.
//!
//! The [`KeyPredicateExt`] trait provides fluent composition:
//!
//! ```
//! use fetchbox_core::predicate::{KeyPredicateExt, Resource, Param};
//!
//! let predicate = Resource::new("tenants")
//!     .or(Resource::new("leases"))
//!     .and(Param::new("tenants", "agency_id", "X").not());
//! ```

use super::KeyPredicate;
use crate::QueryKey;

/// Inverts a predicate.
#[derive(Debug, Clone)]
pub struct Not<P> {
    predicate: P,
}

impl<P> Not<P> {
    /// Creates a new `Not` combinator wrapping the given predicate.
    pub fn new(predicate: P) -> Self {
        Self { predicate }
    }
}

impl<P> KeyPredicate for Not<P>
where
    P: KeyPredicate,
{
    fn matches(&self, key: &QueryKey) -> bool {
        !self.predicate.matches(key)
    }
}

/// Requires both predicates to match.
///
/// Short-circuits: if the left predicate does not match, the right
/// predicate is not evaluated.
#[derive(Debug, Clone)]
pub struct And<L, R> {
    left: L,
    right: R,
}

impl<L, R> And<L, R> {
    /// Creates a new `And` combinator from two predicates.
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L, R> KeyPredicate for And<L, R>
where
    L: KeyPredicate,
    R: KeyPredicate,
{
    fn matches(&self, key: &QueryKey) -> bool {
        self.left.matches(key) && self.right.matches(key)
    }
}

/// Requires either predicate to match.
///
/// Short-circuits: if the left predicate matches, the right predicate is
/// not evaluated.
#[derive(Debug, Clone)]
pub struct Or<L, R> {
    left: L,
    right: R,
}

impl<L, R> Or<L, R> {
    /// Creates a new `Or` combinator from two predicates.
    pub fn new(left: L, right: R) -> Self {
        Self { left, right }
    }
}

impl<L, R> KeyPredicate for Or<L, R>
where
    L: KeyPredicate,
    R: KeyPredicate,
{
    fn matches(&self, key: &QueryKey) -> bool {
        self.left.matches(key) || self.right.matches(key)
    }
}

/// Extension trait for fluent predicate composition.
pub trait KeyPredicateExt: KeyPredicate + Sized {
    /// Combines this predicate with another using AND logic.
    fn and<R>(self, right: R) -> And<Self, R>
    where
        R: KeyPredicate,
    {
        And::new(self, right)
    }

    /// Combines this predicate with another using OR logic.
    fn or<R>(self, right: R) -> Or<Self, R>
    where
        R: KeyPredicate,
    {
        Or::new(self, right)
    }

    /// Inverts this predicate.
    fn not(self) -> Not<Self> {
        Not::new(self)
    }

    /// Boxes this predicate into a trait object.
    ///
    /// Useful when collecting heterogeneous predicates, e.g. the affected
    /// set of a mutation.
    fn boxed(self) -> Box<dyn KeyPredicate>
    where
        Self: 'static,
    {
        Box::new(self)
    }
}

impl<T: KeyPredicate + Sized> KeyPredicateExt for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{AnyKey, Param, Resource};

    fn tenants_x() -> QueryKey {
        QueryKey::from_slice("tenants", &[("agency_id", Some("X"))])
    }

    #[test]
    fn and_or_not() {
        let both = Resource::new("tenants").and(Param::new("tenants", "agency_id", "X"));
        assert!(both.matches(&tenants_x()));
        assert!(!both.matches(&QueryKey::resource_only("tenants")));

        let either = Resource::new("leases").or(Resource::new("tenants"));
        assert!(either.matches(&tenants_x()));

        assert!(!AnyKey.not().matches(&tenants_x()));
    }

    #[test]
    fn boxed_predicates_in_vec() {
        let predicates: Vec<Box<dyn KeyPredicate>> = vec![
            Resource::new("tenants").boxed(),
            Resource::new("leases").not().boxed(),
        ];

        assert!(predicates[0].matches(&tenants_x()));
        assert!(predicates[1].matches(&tenants_x()));
    }
}
