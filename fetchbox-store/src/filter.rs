//! Query filters, ordering, and key derivation.
//!
//! Filters describe *what* a select reads; they also double as the
//! parameters of the query's cache key. Deriving the key from the filters
//! in one place ([`query_key`]) guarantees that query bindings and
//! invalidation predicates agree on request fingerprints.

use fetchbox_core::{KeyPart, KeyParts, QueryKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

/// Comparison operator of a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Column equals value.
    Eq,
    /// Column differs from value.
    Neq,
    /// Column is greater than value.
    Gt,
    /// Column is less than value.
    Lt,
    /// Column contains the value as a substring (strings only).
    Like,
    /// Column equals one of the values in a JSON array.
    In,
}

impl FilterOp {
    /// Returns the operator as a string slice.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Neq => "neq",
            FilterOp::Gt => "gt",
            FilterOp::Lt => "lt",
            FilterOp::Like => "like",
            FilterOp::In => "in",
        }
    }
}

/// A single select filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    column: SmolStr,
    op: FilterOp,
    value: Value,
}

impl Filter {
    /// Creates a filter with an explicit operator.
    pub fn new(column: impl Into<SmolStr>, op: FilterOp, value: impl Into<Value>) -> Self {
        Filter {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    /// Creates an equality filter, the overwhelmingly common case.
    pub fn eq(column: impl Into<SmolStr>, value: impl Into<Value>) -> Self {
        Self::new(column, FilterOp::Eq, value)
    }

    /// Returns the filtered column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Returns the comparison operator.
    pub fn op(&self) -> FilterOp {
        self.op
    }

    /// Returns the comparison value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Evaluates this filter against one row.
    ///
    /// A missing column never matches. Comparisons between mismatched JSON
    /// types never match either; the typed schema layer rejects such rows
    /// before they reach callers.
    pub fn matches(&self, row: &Value) -> bool {
        let Some(field) = row.get(self.column.as_str()) else {
            return false;
        };
        match self.op {
            FilterOp::Eq => field == &self.value,
            FilterOp::Neq => field != &self.value,
            FilterOp::Gt => match (field.as_f64(), self.value.as_f64()) {
                (Some(lhs), Some(rhs)) => lhs > rhs,
                _ => false,
            },
            FilterOp::Lt => match (field.as_f64(), self.value.as_f64()) {
                (Some(lhs), Some(rhs)) => lhs < rhs,
                _ => false,
            },
            FilterOp::Like => match (field.as_str(), self.value.as_str()) {
                (Some(lhs), Some(rhs)) => lhs.contains(rhs),
                _ => false,
            },
            FilterOp::In => match self.value.as_array() {
                Some(candidates) => candidates.contains(field),
                None => false,
            },
        }
    }

    /// Renders this filter as one cache key part.
    ///
    /// Equality filters render as plain `column=value`; other operators
    /// prefix the column with the operator name so `age gt 30` and
    /// `age lt 30` produce distinct fingerprints.
    pub fn key_part(&self) -> KeyPart {
        let value = render_value(&self.value);
        match self.op {
            FilterOp::Eq => KeyPart::new(self.column.as_str(), Some(value)),
            op => KeyPart::new(
                format!("{}.{}", self.column, op.as_str()),
                Some(value),
            ),
        }
    }
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Result ordering of a select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ordering {
    column: SmolStr,
    #[serde(default)]
    descending: bool,
}

impl Ordering {
    /// Ascending order on `column`.
    pub fn asc(column: impl Into<SmolStr>) -> Self {
        Ordering {
            column: column.into(),
            descending: false,
        }
    }

    /// Descending order on `column`.
    pub fn desc(column: impl Into<SmolStr>) -> Self {
        Ordering {
            column: column.into(),
            descending: true,
        }
    }

    /// Returns the ordered column name.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Returns true for descending order.
    pub fn is_descending(&self) -> bool {
        self.descending
    }

    /// Compares two rows under this ordering.
    pub fn compare(&self, lhs: &Value, rhs: &Value) -> std::cmp::Ordering {
        let l = lhs.get(self.column.as_str());
        let r = rhs.get(self.column.as_str());
        let ord = compare_values(l, r);
        if self.descending { ord.reverse() } else { ord }
    }
}

fn compare_values(lhs: Option<&Value>, rhs: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering as O;
    match (lhs, rhs) {
        (None, None) => O::Equal,
        (None, Some(_)) => O::Less,
        (Some(_), None) => O::Greater,
        (Some(l), Some(r)) => match (l, r) {
            (Value::Number(l), Value::Number(r)) => l
                .as_f64()
                .partial_cmp(&r.as_f64())
                .unwrap_or(O::Equal),
            (Value::String(l), Value::String(r)) => l.cmp(r),
            (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
            _ => O::Equal,
        },
    }
}

/// Derives the canonical cache key for a select over `table` with `filters`.
///
/// Every hook and every invalidation predicate that talks about the same
/// select must go through this derivation.
pub fn query_key(table: &str, filters: &[Filter]) -> QueryKey {
    let mut parts = KeyParts::new(table);
    for filter in filters {
        parts.push(filter.key_part());
    }
    parts.into_query_key()
}
