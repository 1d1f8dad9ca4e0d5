//! Error types for query operations.

use thiserror::Error;

/// Error type for remote query and mutation operations.
///
/// This enum categorizes failures crossing the Remote Store boundary into
/// the groups the cache and its callers handle differently: transport
/// failures are retryable by the user, rejections are not, and missing
/// authentication is routed to the guard rather than displayed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The remote call did not complete.
    ///
    /// Connection refused, timeout, DNS failure. The request may or may
    /// not have reached the remote store.
    #[error("network failure: {0}")]
    NetworkFailure(String),

    /// The remote call completed but reported a business or validation error.
    ///
    /// Also covers rows that failed schema validation at the store client
    /// boundary: malformed data is rejected here instead of propagating
    /// untyped payloads into the cache.
    #[error("remote rejection: {0}")]
    RemoteRejection(String),

    /// The operation required a session that was absent or expired.
    #[error("not authenticated")]
    NotAuthenticated,

    /// An expected single-row read returned no rows.
    #[error("not found: {0}")]
    NotFound(String),
}

impl FetchError {
    /// Returns a short label for the error class, used in tracing fields.
    pub const fn kind(&self) -> &'static str {
        match self {
            FetchError::NetworkFailure(_) => "network",
            FetchError::RemoteRejection(_) => "rejection",
            FetchError::NotAuthenticated => "unauthenticated",
            FetchError::NotFound(_) => "not_found",
        }
    }
}
