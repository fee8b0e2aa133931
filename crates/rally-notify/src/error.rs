//! Error types for notification dispatch.

use rally_directory::DirectoryError;
use rally_events::StoreError;

use crate::DeliveryError;

/// Errors raised while preparing or delivering a notification.
///
/// These never escape the dispatcher; they are logged and carried in
/// [`crate::DispatchOutcome::Failed`].
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("event not found: {0}")]
    EventNotFound(String),

    #[error("event store error: {0}")]
    Store(#[from] StoreError),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("database pool error: {0}")]
    Pool(String),
}
