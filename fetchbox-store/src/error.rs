//! Error types for store operations.

use fetchbox_core::FetchError;
use thiserror::Error;

/// Error type for Remote Store operations.
///
/// This enum categorizes errors at the store client boundary. The cache
/// layer never sees `StoreError` directly - loaders convert it into
/// [`FetchError`] via the provided `From` impl.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Transport-level failure: the call did not complete.
    #[error("transport error: {0}")]
    Transport(String),

    /// The store completed the call but rejected it.
    #[error("rejected ({code}): {message}")]
    Rejected {
        /// Store-assigned rejection code.
        code: String,
        /// Human-readable rejection reason.
        message: String,
    },

    /// The operation required a session and none was present.
    #[error("no active session")]
    MissingSession,

    /// A row did not match the declared resource schema.
    #[error("row decode error: {0}")]
    Decode(String),

    /// The named table does not exist.
    #[error("unknown table: {0}")]
    MissingTable(String),
}

impl From<StoreError> for FetchError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Transport(message) => FetchError::NetworkFailure(message),
            StoreError::Rejected { code, message } => {
                FetchError::RemoteRejection(format!("{code}: {message}"))
            }
            StoreError::MissingSession => FetchError::NotAuthenticated,
            StoreError::Decode(message) => FetchError::RemoteRejection(message),
            StoreError::MissingTable(table) => {
                FetchError::RemoteRejection(format!("unknown table: {table}"))
            }
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
