use modelops_core::{
    normalize_commit_hash, Clock, ModelSchema, PackageDependency, RegisteredModel, Run,
    RunArtifact, SystemClock,
};
use std::time::Duration;
use uuid::Uuid;

use crate::{
    config::RepositoryConfig,
    models::{
        duration_to_millis, ModelSchemaRecord, PackageDependencyRecord, RegisteredModelRecord,
        RunArtifactRecord, RunRecord,
    },
    resolver::{EntityResolver, RegisteredModelResolver, RunResolver},
    session::{Session, SessionFactory},
    Error, Result,
};

/// Reads and writes runs, their artifacts and registered models.
///
/// Every call opens its own session and drops it before returning, so a
/// repository holds no state between calls and can be cloned freely across
/// tasks.
#[derive(Clone)]
pub struct RunRepository<F, C = SystemClock> {
    sessions: F,
    clock: C,
    config: RepositoryConfig,
    run_resolver: RunResolver,
    registered_model_resolver: RegisteredModelResolver,
}

impl<F: SessionFactory> RunRepository<F, SystemClock> {
    pub fn new(sessions: F) -> Self {
        Self::with_clock(sessions, SystemClock)
    }
}

impl<F: SessionFactory, C: Clock> RunRepository<F, C> {
    pub fn with_clock(sessions: F, clock: C) -> Self {
        let run_resolver = RunResolver;

        Self {
            sessions,
            clock,
            config: RepositoryConfig::default(),
            run_resolver,
            registered_model_resolver: RegisteredModelResolver::new(run_resolver),
        }
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    // ========================================================================
    // Run Operations
    // ========================================================================

    /// Create a run for an experiment
    pub async fn create_run(
        &self,
        experiment_id: Uuid,
        package_dependencies: Vec<PackageDependency>,
        git_commit_hash: Option<&str>,
    ) -> Result<Run> {
        let run = Run::new(experiment_id, self.clock.now())
            .with_git_commit_hash(git_commit_hash)
            .with_package_dependencies(package_dependencies);

        let record = RunRecord {
            id: run.id,
            experiment_id: run.experiment_id,
            git_commit_hash: run.git_commit_hash.clone(),
            training_time_ms: None,
            created_at: run.created_at,
        };

        let mut session = self.sessions.new_session().await?;
        session.insert_run(&record).await?;
        session
            .insert_package_dependencies(&PackageDependencyRecord::for_run(
                run.id,
                &run.package_dependencies,
            ))
            .await?;
        session.commit().await?;

        tracing::info!(
            "Created run {} for experiment {} ({} dependencies)",
            run.id,
            experiment_id,
            run.package_dependencies.len()
        );

        Ok(run)
    }

    /// Replace the model schema of a run
    pub async fn set_model_schema(&self, run_id: Uuid, schemas: Vec<ModelSchema>) -> Result<()> {
        let mut session = self.sessions.new_session().await?;
        if session.find_run(run_id).await?.is_none() {
            return Err(Error::RunNotFound(run_id));
        }

        session
            .replace_model_schemas(run_id, &ModelSchemaRecord::for_run(run_id, &schemas))
            .await?;
        session.commit().await?;

        tracing::info!("Set {} schema fields on run {}", schemas.len(), run_id);

        Ok(())
    }

    /// Get run by ID
    pub async fn get_run(&self, run_id: Uuid) -> Result<Option<Run>> {
        let mut session = self.sessions.new_session().await?;
        let record = session.find_run(run_id).await?;

        self.run_resolver.build_entity(&mut session, record).await
    }

    /// Get the most recently created run for a commit hash
    pub async fn get_run_by_commit_hash(&self, git_commit_hash: &str) -> Result<Option<Run>> {
        let Some(hash) = normalize_commit_hash(Some(git_commit_hash)) else {
            return Ok(None);
        };

        let mut session = self.sessions.new_session().await?;
        let record = session.find_latest_run_by_commit_hash(&hash).await?;

        self.run_resolver.build_entity(&mut session, record).await
    }

    /// Get all runs of an experiment, oldest first
    pub async fn get_runs(&self, experiment_id: Uuid) -> Result<Vec<Run>> {
        let mut session = self.sessions.new_session().await?;
        let records = session.find_runs_by_experiment(experiment_id).await?;

        tracing::debug!(
            "Found {} runs for experiment {}",
            records.len(),
            experiment_id
        );

        self.run_resolver.build_entities(&mut session, records).await
    }

    /// Record how long a run spent training
    pub async fn set_training_time(&self, run_id: Uuid, training_time: Duration) -> Result<()> {
        let mut session = self.sessions.new_session().await?;
        if session.find_run(run_id).await?.is_none() {
            return Err(Error::RunNotFound(run_id));
        }

        session
            .update_training_time(run_id, duration_to_millis(training_time))
            .await?;
        session.commit().await?;

        tracing::info!("Set training time of run {} to {:?}", run_id, training_time);

        Ok(())
    }

    // ========================================================================
    // Artifact Operations
    // ========================================================================

    /// Create an artifact for a run
    pub async fn create_run_artifact(&self, run_id: Uuid, name: &str) -> Result<RunArtifact> {
        let mut session = self.sessions.new_session().await?;
        if session.find_run(run_id).await?.is_none() {
            return Err(Error::RunNotFound(run_id));
        }

        let artifact = RunArtifact::new(run_id, name, self.clock.now());
        session
            .insert_run_artifact(&RunArtifactRecord::from(&artifact))
            .await?;
        session.commit().await?;

        tracing::info!(
            "Created run artifact {} ({}) for run {}",
            artifact.name,
            artifact.id,
            run_id
        );

        Ok(artifact)
    }

    /// Get the artifacts of a run
    pub async fn get_run_artifacts(&self, run_id: Uuid) -> Result<Vec<RunArtifact>> {
        let mut session = self.sessions.new_session().await?;
        let records = session.find_run_artifacts(run_id).await?;

        Ok(records.into_iter().map(RunArtifact::from).collect())
    }

    // ========================================================================
    // Registered Model Operations
    // ========================================================================

    /// Register a run artifact as the next model version of an experiment.
    ///
    /// The version is `max(existing) + 1`, starting at 1. A concurrent
    /// registration that takes the same version first makes this attempt fail
    /// with `Error::VersionConflict`; the whole read-compute-write sequence is
    /// then retried in a fresh session, up to
    /// `RepositoryConfig::max_register_attempts` times.
    pub async fn register_model(
        &self,
        experiment_id: Uuid,
        run_artifact_id: Uuid,
        registered_by: &str,
        description: &str,
    ) -> Result<RegisteredModel> {
        let max_attempts = self.config.max_register_attempts.max(1);
        let mut attempt = 1;

        loop {
            match self
                .try_register_model(experiment_id, run_artifact_id, registered_by, description)
                .await
            {
                Err(Error::VersionConflict { version, .. }) if attempt < max_attempts => {
                    tracing::warn!(
                        "Version {} of experiment {} was taken concurrently, retrying ({}/{})",
                        version,
                        experiment_id,
                        attempt,
                        max_attempts
                    );
                    tokio::time::sleep(self.config.register_retry_backoff() * attempt).await;
                    attempt += 1;
                }
                Err(err @ Error::VersionConflict { .. }) => {
                    tracing::error!(
                        "Giving up registering artifact {} after {} attempts: {}",
                        run_artifact_id,
                        attempt,
                        err
                    );
                    return Err(err);
                }
                result => return result,
            }
        }
    }

    async fn try_register_model(
        &self,
        experiment_id: Uuid,
        run_artifact_id: Uuid,
        registered_by: &str,
        description: &str,
    ) -> Result<RegisteredModel> {
        let mut session = self.sessions.new_session().await?;

        let artifact = session
            .find_run_artifact(run_artifact_id)
            .await?
            .ok_or(Error::RunArtifactNotFound(run_artifact_id))?;

        let run = session.find_run(artifact.run_id).await?.ok_or_else(|| {
            Error::Integrity(format!(
                "run artifact {} references missing run {}",
                artifact.id, artifact.run_id
            ))
        })?;

        if run.experiment_id != experiment_id {
            return Err(Error::ExperimentMismatch {
                run_artifact_id,
                owner_experiment_id: run.experiment_id,
                requested_experiment_id: experiment_id,
            });
        }

        let latest = session.max_registered_model_version(run.experiment_id).await?;
        let record = RegisteredModelRecord {
            id: Uuid::new_v4(),
            run_artifact_id: artifact.id,
            run_id: run.id,
            experiment_id: run.experiment_id,
            registered_by: registered_by.to_string(),
            registered_date: self.clock.now(),
            description: description.to_string(),
            version: RegisteredModel::next_version(latest)?,
        };

        session.insert_registered_model(&record).await?;
        let model = self
            .registered_model_resolver
            .build_entity(&mut session, Some(record))
            .await?
            .ok_or_else(|| Error::Integrity("registered model vanished before commit".into()))?;
        session.commit().await?;

        tracing::info!(
            "Registered artifact {} as version {} of experiment {}",
            run_artifact_id,
            model.version,
            experiment_id
        );

        Ok(model)
    }

    /// Get every registered model of an experiment, lowest version first
    pub async fn get_registered_models(&self, experiment_id: Uuid) -> Result<Vec<RegisteredModel>> {
        let mut session = self.sessions.new_session().await?;
        let records = session.find_registered_models(experiment_id).await?;

        self.registered_model_resolver
            .build_entities(&mut session, records)
            .await
    }

    /// Get one version of an experiment's registered model
    pub async fn get_registered_model(
        &self,
        experiment_id: Uuid,
        version: i32,
    ) -> Result<Option<RegisteredModel>> {
        let mut session = self.sessions.new_session().await?;
        let record = session.find_registered_model(experiment_id, version).await?;

        self.registered_model_resolver
            .build_entity(&mut session, record)
            .await
    }

    /// Get the highest registered version of an experiment
    pub async fn get_latest_registered_model(
        &self,
        experiment_id: Uuid,
    ) -> Result<Option<RegisteredModel>> {
        let mut session = self.sessions.new_session().await?;
        let record = session.find_latest_registered_model(experiment_id).await?;

        self.registered_model_resolver
            .build_entity(&mut session, record)
            .await
    }
}
