//! Error types for the event store.

use rusqlite::ffi::ErrorCode;

/// Errors that can occur during event store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A row violated a domain constraint enforced by the schema.
    #[error("{0}")]
    Validation(String),

    /// No row matched. For owner-scoped updates this also covers a caller
    /// who does not own the event.
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other SQLite failure, tagged with the operation that issued it.
    #[error("{op} failed: {source}")]
    Storage {
        op: &'static str,
        source: rusqlite::Error,
    },

    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StoreError {
    /// Classifies a SQLite error raised by `op`.
    pub(crate) fn from_sqlite(op: &'static str, err: rusqlite::Error) -> Self {
        match constraint_message(&err) {
            Some(message) => Self::Validation(message.to_string()),
            None => Self::Storage { op, source: err },
        }
    }
}

/// Returns a `map_err` adapter that classifies errors raised by `op`.
pub(crate) fn storage(op: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |err| StoreError::from_sqlite(op, err)
}

/// Maps a named check constraint in the driver message to a user-facing text.
fn constraint_message(err: &rusqlite::Error) -> Option<&'static str> {
    let rusqlite::Error::SqliteFailure(code, Some(message)) = err else {
        return None;
    };
    if code.code != ErrorCode::ConstraintViolation {
        return None;
    }
    if message.contains("event_time_order") {
        Some("event cannot end before it starts")
    } else if message.contains("event_individual_requires_team") {
        Some("an individual event must belong to a team")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constraint_failure(message: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT_CHECK),
            Some(message.to_string()),
        )
    }

    #[test]
    fn named_checks_become_validation_errors() {
        let err = StoreError::from_sqlite(
            "create_event",
            constraint_failure("CHECK constraint failed: event_time_order"),
        );
        match err {
            StoreError::Validation(msg) => assert_eq!(msg, "event cannot end before it starts"),
            other => panic!("expected Validation, got {other:?}"),
        }
    }

    #[test]
    fn unknown_constraints_keep_operation_context() {
        let err = StoreError::from_sqlite(
            "add_guests",
            constraint_failure("FOREIGN KEY constraint failed"),
        );
        match err {
            StoreError::Storage { op, .. } => assert_eq!(op, "add_guests"),
            other => panic!("expected Storage, got {other:?}"),
        }
        assert!(StoreError::from_sqlite("find_event_by_id", rusqlite::Error::InvalidQuery)
            .to_string()
            .starts_with("find_event_by_id failed"));
    }
}
