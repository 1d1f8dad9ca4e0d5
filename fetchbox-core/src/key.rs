//! Query key types and construction.
//!
//! This module provides types for building and representing query keys:
//!
//! - [`QueryKey`] - The complete request fingerprint: resource name plus parameters
//! - [`KeyPart`] - A single key-value parameter of a query key
//! - [`KeyParts`] - Builder for accumulating parts while deriving a key
//!
//! ## Key Structure
//!
//! A query key fingerprints one distinct remote read. Two keys are equal
//! iff their resource names and ordered parameter lists are equal; every
//! distinct key owns its own cache entry.
//!
//! ## Format
//!
//! When rendered to a string (for logs and tracing), keys follow
//! `{resource}:key1=value1&key2=value2`:
//!
//! ```
//! use fetchbox_core::{QueryKey, KeyPart};
//!
//! let key = QueryKey::new("tenants", vec![KeyPart::new("agency_id", Some("X"))]);
//! assert_eq!(format!("{}", key), "tenants:agency_id=X");
//!
//! // No parameters
//! let key = QueryKey::new("profiles", vec![]);
//! assert_eq!(format!("{}", key), "profiles");
//!
//! // KeyPart with None value (flag parameter)
//! let key = QueryKey::new("leases", vec![KeyPart::new("active", None::<&str>)]);
//! assert_eq!(format!("{}", key), "leases:active");
//! ```
//!
//! ## Performance
//!
//! [`QueryKey`] uses `Arc` internally for cheap cloning - copying a key
//! only increments a reference count. [`KeyPart`] uses [`SmolStr`] so
//! short strings are stored inline without heap allocation.

use smol_str::SmolStr;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Inner structure containing the actual key data.
/// Wrapped in Arc for cheap cloning.
#[derive(Debug, Clone, Eq, PartialEq, Hash, serde::Serialize)]
struct QueryKeyInner {
    resource: SmolStr,
    params: Vec<KeyPart>,
}

/// A key identifying one distinct remote query.
///
/// Query keys are composed of:
/// - A **resource** name (usually the remote table, e.g. "tenants")
/// - A list of **params** (key-value pairs) derived from the query filters
///
/// # Cheap Cloning
///
/// `QueryKey` wraps its data in [`Arc`], making `clone()` an O(1) operation
/// that only increments a reference count. Keys are passed around on every
/// cache operation, so this matters.
///
/// # Example
///
/// ```
/// use fetchbox_core::{QueryKey, KeyPart};
///
/// let key = QueryKey::new(
///     "apartments",
///     vec![
///         KeyPart::new("agency_id", Some("42")),
///         KeyPart::new("status", Some("vacant")),
///     ],
/// );
///
/// assert_eq!(key.resource(), "apartments");
/// assert_eq!(format!("{}", key), "apartments:agency_id=42&status=vacant");
/// ```
#[derive(Clone, Debug, serde::Serialize)]
#[serde(into = "QueryKeyInner")]
pub struct QueryKey {
    inner: Arc<QueryKeyInner>,
}

impl PartialEq for QueryKey {
    fn eq(&self, other: &Self) -> bool {
        // Fast path: same Arc pointer
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner == other.inner
    }
}

impl Eq for QueryKey {}

impl Hash for QueryKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.hash(state);
    }
}

impl From<QueryKeyInner> for QueryKey {
    fn from(inner: QueryKeyInner) -> Self {
        QueryKey {
            inner: Arc::new(inner),
        }
    }
}

impl From<QueryKey> for QueryKeyInner {
    fn from(key: QueryKey) -> Self {
        // Try to unwrap Arc, or clone if shared
        Arc::try_unwrap(key.inner).unwrap_or_else(|arc| (*arc).clone())
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Compact format: resource:key=value&key2=value2
        write!(f, "{}", self.inner.resource)?;
        for (i, part) in self.inner.params.iter().enumerate() {
            if i == 0 {
                write!(f, ":")?;
            } else {
                write!(f, "&")?;
            }
            write!(f, "{}", part)?;
        }
        Ok(())
    }
}

impl QueryKey {
    /// Creates a new query key with the given resource and parameters.
    pub fn new(resource: impl Into<SmolStr>, params: Vec<KeyPart>) -> Self {
        QueryKey {
            inner: Arc::new(QueryKeyInner {
                resource: resource.into(),
                params,
            }),
        }
    }

    /// Creates a parameterless key for a whole-resource query.
    pub fn resource_only(resource: impl Into<SmolStr>) -> Self {
        Self::new(resource, Vec::new())
    }

    /// Creates a query key from a slice of key-value pairs.
    pub fn from_slice(resource: &str, params: &[(&str, Option<&str>)]) -> Self {
        let params = params
            .iter()
            .map(|(key, value)| KeyPart::new(key, *value))
            .collect();
        Self::new(resource, params)
    }

    /// Returns the resource name of this key.
    pub fn resource(&self) -> &str {
        &self.inner.resource
    }

    /// Returns an iterator over the key parameters.
    pub fn params(&self) -> impl Iterator<Item = &KeyPart> {
        self.inner.params.iter()
    }

    /// Returns the value of the named parameter, if present.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.inner
            .params
            .iter()
            .find(|part| part.key() == name)
            .and_then(KeyPart::value)
    }
}

/// A single parameter of a query key.
///
/// Each part represents one filter of the underlying query. The value is
/// optional - some parts are key-only flags.
///
/// # Example
///
/// ```
/// use fetchbox_core::KeyPart;
///
/// let agency = KeyPart::new("agency_id", Some("X"));
/// assert_eq!(agency.key(), "agency_id");
/// assert_eq!(agency.value(), Some("X"));
///
/// let flag = KeyPart::new("archived", None::<&str>);
/// assert_eq!(flag.value(), None);
/// ```
#[derive(Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct KeyPart {
    key: SmolStr,
    value: Option<SmolStr>,
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key)?;
        if let Some(ref value) = self.value {
            write!(f, "={}", value)?;
        }
        Ok(())
    }
}

impl KeyPart {
    /// Creates a new key part.
    pub fn new<K: AsRef<str>, V: AsRef<str>>(key: K, value: Option<V>) -> Self {
        KeyPart {
            key: SmolStr::new(key),
            value: value.map(SmolStr::new),
        }
    }

    /// Returns the parameter name.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the optional parameter value.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }
}

/// Builder for accumulating key parts while deriving a query key.
///
/// The store layer turns query filters into parts one by one; calling
/// [`KeyParts::into_query_key`] produces the final [`QueryKey`]. Keeping
/// derivation in one place guarantees that query bindings and invalidation
/// predicates agree on fingerprints.
#[derive(Debug)]
pub struct KeyParts {
    resource: SmolStr,
    parts: Vec<KeyPart>,
}

impl KeyParts {
    /// Creates a new accumulator for the given resource.
    pub fn new(resource: impl Into<SmolStr>) -> Self {
        KeyParts {
            resource: resource.into(),
            parts: Vec::new(),
        }
    }

    /// Adds a single key part.
    pub fn push(&mut self, part: KeyPart) {
        self.parts.push(part)
    }

    /// Appends multiple key parts from a vector.
    pub fn append(&mut self, parts: &mut Vec<KeyPart>) {
        self.parts.append(parts)
    }

    /// Consumes the builder and returns the finished key.
    pub fn into_query_key(self) -> QueryKey {
        QueryKey::new(self.resource, self.parts)
    }
}
