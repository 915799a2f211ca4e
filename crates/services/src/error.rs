//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use vision_core::SessionError;
use vision_core::model::{TestKind, UserId};

/// Errors emitted by `VisionTestService` and `ResultsService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TestServiceError {
    #[error("no {kind} session found for user {user_id}")]
    NotFound { kind: TestKind, user_id: UserId },
    #[error("session was modified concurrently, reload and retry")]
    Conflict,
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Storage(StorageError),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<StorageError> for TestServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict => Self::Conflict,
            StorageError::Serialization(msg) => Self::Serialization(msg),
            other => Self::Storage(other),
        }
    }
}

impl From<serde_json::Error> for TestServiceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_conflict_maps_to_conflict() {
        let err: TestServiceError = StorageError::Conflict.into();
        assert!(matches!(err, TestServiceError::Conflict));
    }

    #[test]
    fn storage_serialization_keeps_message() {
        let err: TestServiceError = StorageError::Serialization("bad json".into()).into();
        assert_eq!(err.to_string(), "serialization error: bad json");
    }

    #[test]
    fn not_found_names_kind_and_user() {
        let err = TestServiceError::NotFound {
            kind: TestKind::ColorVision,
            user_id: UserId::new(4),
        };
        assert_eq!(err.to_string(), "no color_vision session found for user 4");
    }
}
