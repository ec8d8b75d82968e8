use keel_state::StoreError;
use thiserror::Error;

use crate::driver::DriverError;

/// Result type for pod queries.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors from pod queries and operator actions.
///
/// Not-found errors are raised before anything is written or killed.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("pod instance '{0}' not found")]
    PodNotFound(String),

    #[error("task '{task}' not found in pod instance '{pod}'")]
    TaskNotFound { pod: String, task: String },

    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    #[error("failed to mark tasks permanently failed: {0}")]
    Failure(#[source] StoreError),
}

impl QueryError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PodNotFound(_) | Self::TaskNotFound { .. })
    }

    /// HTTP status an operator-facing layer should answer with.
    pub fn status_code(&self) -> u16 {
        if self.is_not_found() {
            404
        } else {
            500
        }
    }
}
