//! Unit-of-work boundary between the repository and a backing store.
//!
//! A [`Session`] is opened per repository call and owns every read and write
//! made by that call. Writes stay private to the session until
//! [`Session::commit`]; dropping a session without committing discards them.

use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    models::{
        ModelSchemaRecord, PackageDependencyRecord, RegisteredModelRecord, RunArtifactRecord,
        RunRecord,
    },
    Result,
};

#[async_trait]
pub trait Session: Send {
    // ========================================================================
    // Runs
    // ========================================================================

    async fn insert_run(&mut self, run: &RunRecord) -> Result<()>;

    async fn find_run(&mut self, run_id: Uuid) -> Result<Option<RunRecord>>;

    /// Most recently created run with this hash; ties break on the higher id.
    async fn find_latest_run_by_commit_hash(&mut self, hash: &str) -> Result<Option<RunRecord>>;

    /// Runs of an experiment, oldest first.
    async fn find_runs_by_experiment(&mut self, experiment_id: Uuid) -> Result<Vec<RunRecord>>;

    async fn update_training_time(&mut self, run_id: Uuid, training_time_ms: i64) -> Result<()>;

    // ========================================================================
    // Run children
    // ========================================================================

    async fn insert_package_dependencies(&mut self, deps: &[PackageDependencyRecord])
        -> Result<()>;

    async fn find_package_dependencies(
        &mut self,
        run_id: Uuid,
    ) -> Result<Vec<PackageDependencyRecord>>;

    /// Drops every schema row of `run_id` and stores `schemas` in their place.
    async fn replace_model_schemas(
        &mut self,
        run_id: Uuid,
        schemas: &[ModelSchemaRecord],
    ) -> Result<()>;

    /// Ordered by position.
    async fn find_model_schemas(&mut self, run_id: Uuid) -> Result<Vec<ModelSchemaRecord>>;

    // ========================================================================
    // Artifacts
    // ========================================================================

    async fn insert_run_artifact(&mut self, artifact: &RunArtifactRecord) -> Result<()>;

    async fn find_run_artifact(&mut self, artifact_id: Uuid)
        -> Result<Option<RunArtifactRecord>>;

    async fn find_run_artifacts(&mut self, run_id: Uuid) -> Result<Vec<RunArtifactRecord>>;

    // ========================================================================
    // Registered models
    // ========================================================================

    async fn max_registered_model_version(&mut self, experiment_id: Uuid) -> Result<Option<i32>>;

    /// Fails with `Error::VersionConflict` when `(experiment_id, version)` is
    /// already taken, either here or at commit time.
    async fn insert_registered_model(&mut self, model: &RegisteredModelRecord) -> Result<()>;

    /// Ordered by version.
    async fn find_registered_models(
        &mut self,
        experiment_id: Uuid,
    ) -> Result<Vec<RegisteredModelRecord>>;

    async fn find_registered_model(
        &mut self,
        experiment_id: Uuid,
        version: i32,
    ) -> Result<Option<RegisteredModelRecord>>;

    async fn find_latest_registered_model(
        &mut self,
        experiment_id: Uuid,
    ) -> Result<Option<RegisteredModelRecord>>;

    /// Makes every pending write visible to other sessions, or none of them.
    async fn commit(self) -> Result<()>;
}

#[async_trait]
pub trait SessionFactory: Send + Sync {
    type Session: Session;

    async fn new_session(&self) -> Result<Self::Session>;
}
