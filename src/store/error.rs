//! Persistence error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// Persistence error with location tracking.
///
/// `retryable` marks transient conditions such as lock contention; the
/// operation that raised it applied nothing and may be retried as-is.
#[derive(Debug, Clone, Display, Error)]
#[display("Store error: {} at {}:{}", message, file, line)]
pub struct StoreError {
    /// Error message.
    pub message: String,
    /// Whether retrying the same call may succeed.
    pub retryable: bool,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl StoreError {
    /// Creates a permanent store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            retryable: false,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Creates a transient store error with caller location tracking.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            retryable: true,
            ..Self::new(message)
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    #[track_caller]
    fn from(err: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};

        match &err {
            Error::DatabaseError(DatabaseErrorKind::SerializationFailure, _) => {
                Self::transient(format!("Diesel error: {}", err))
            }
            Error::DatabaseError(_, info)
                if info.message().contains("locked") || info.message().contains("busy") =>
            {
                Self::transient(format!("Diesel error: {}", err))
            }
            _ => Self::new(format!("Diesel error: {}", err)),
        }
    }
}

impl From<diesel::ConnectionError> for StoreError {
    #[track_caller]
    fn from(err: diesel::ConnectionError) -> Self {
        Self::transient(format!("Connection error: {}", err))
    }
}
