//! Repository error types.

use thiserror::Error;

use crate::store::StoreError;

/// Errors returned by every repository operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RepositoryError {
    /// The referenced project id is not in the collection.
    #[error("Project not found: {0}")]
    NotFound(String),

    /// A project with this id already exists.
    #[error("Project already exists: {0}")]
    Conflict(String),

    /// Persisted data could not be parsed.
    #[error("Corrupted data under key '{key}': {message}")]
    Corrupted { key: String, message: String },

    /// A storage state violates the collection invariants.
    #[error("Invalid storage state: {0}")]
    InvalidState(String),

    /// The remote backend could not be reached, timed out, or answered
    /// with a non-success status.
    #[error("Network error: {0}")]
    Network(String),

    /// The key-value store rejected a read or write.
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Repository is not initialized")]
    NotInitialized,
}

impl RepositoryError {
    /// True for failures that a later replay against the same backend could
    /// plausibly fix.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, RepositoryError::Network(_))
    }
}

impl From<StoreError> for RepositoryError {
    fn from(e: StoreError) -> Self {
        RepositoryError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(e: serde_json::Error) -> Self {
        RepositoryError::Serialization(e.to_string())
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_network_errors_are_connectivity() {
        assert!(RepositoryError::Network("timeout".into()).is_connectivity());
        assert!(!RepositoryError::NotFound("p1".into()).is_connectivity());
        assert!(!RepositoryError::Conflict("p1".into()).is_connectivity());
        assert!(!RepositoryError::Storage("quota".into()).is_connectivity());
    }

    #[test]
    fn test_messages_are_human_readable() {
        assert_eq!(
            RepositoryError::NotFound("p1".into()).to_string(),
            "Project not found: p1"
        );
        let corrupted = RepositoryError::Corrupted {
            key: "trvis-projects".into(),
            message: "expected value".into(),
        };
        assert!(corrupted.to_string().contains("trvis-projects"));
    }
}
