use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("The run with id {0} does not exist")]
    RunNotFound(Uuid),

    #[error("The RunArtifact with id {0} does not exist. Unable to register a model")]
    RunArtifactNotFound(Uuid),

    #[error("Registered model version {version} already exists for experiment {experiment_id}")]
    VersionConflict { experiment_id: Uuid, version: i32 },

    #[error(
        "RunArtifact {run_artifact_id} belongs to experiment {owner_experiment_id}, not {requested_experiment_id}"
    )]
    ExperimentMismatch {
        run_artifact_id: Uuid,
        owner_experiment_id: Uuid,
        requested_experiment_id: Uuid,
    },

    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Core(#[from] modelops_core::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    /// Conflicts are the only failures a caller can resolve by trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::VersionConflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::RunNotFound(_) | Error::RunArtifactNotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let conflict = Error::VersionConflict {
            experiment_id: Uuid::new_v4(),
            version: 3,
        };
        assert!(conflict.is_retryable());
        assert!(!conflict.is_not_found());

        let missing = Error::RunArtifactNotFound(Uuid::new_v4());
        assert!(missing.is_not_found());
        assert!(!missing.is_retryable());
        assert!(missing
            .to_string()
            .ends_with("does not exist. Unable to register a model"));
    }

    #[test]
    fn test_version_overflow_is_not_retryable() {
        let err = Error::from(modelops_core::Error::VersionOverflow(i32::MAX));
        assert!(matches!(
            err,
            Error::Core(modelops_core::Error::VersionOverflow(i32::MAX))
        ));
        assert!(!err.is_retryable());
        assert!(!err.is_not_found());
    }
}
