//! Error types for the event service.

use rally_directory::DirectoryError;
use rally_events::StoreError;

/// Errors returned by [`crate::EventService`].
///
/// `Validation`, `NotFound` and `Authorization` carry messages that are
/// safe to show to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Authorization(String),

    #[error("event store error: {0}")]
    Store(StoreError),

    #[error("directory error: {0}")]
    Directory(DirectoryError),
}

impl ServiceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn event_not_found(id: &str) -> Self {
        Self::NotFound(format!("event {id}"))
    }

    /// Returns `true` if the message may be shown to the caller as-is.
    pub fn is_exposable(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::NotFound(_) | Self::Authorization(_)
        )
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation(message) => Self::Validation(message),
            StoreError::NotFound(what) => Self::NotFound(what),
            other => Self::Store(other),
        }
    }
}

impl From<DirectoryError> for ServiceError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound { entity, id } => Self::NotFound(format!("{entity} {id}")),
            other => Self::Directory(other),
        }
    }
}

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Store(StoreError::Storage {
            op: "transaction",
            source: err,
        })
    }
}
