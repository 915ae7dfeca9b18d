//! Hydration of flat records into full entity graphs.
//!
//! Resolvers never open sessions of their own: they read through the session
//! the caller already holds, so the graph they build comes from the same
//! snapshot as the record that triggered it.

use async_trait::async_trait;
use modelops_core::{RegisteredModel, Run, RunArtifact};

use crate::{
    models::{RegisteredModelRecord, RunRecord},
    session::Session,
    Error, Result,
};

#[async_trait]
pub trait EntityResolver: Send + Sync {
    type Record: Send + 'static;
    type Entity: Send;

    /// Hydrates one record. A missing record resolves to `None`.
    async fn build_entity<S: Session>(
        &self,
        session: &mut S,
        record: Option<Self::Record>,
    ) -> Result<Option<Self::Entity>>;

    /// Hydrates each record in order.
    async fn build_entities<S: Session>(
        &self,
        session: &mut S,
        records: Vec<Self::Record>,
    ) -> Result<Vec<Self::Entity>> {
        let mut entities = Vec::with_capacity(records.len());
        for record in records {
            if let Some(entity) = self.build_entity(session, Some(record)).await? {
                entities.push(entity);
            }
        }

        Ok(entities)
    }
}

/// Attaches package dependencies, model schemas and artifacts to a run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunResolver;

#[async_trait]
impl EntityResolver for RunResolver {
    type Record = RunRecord;
    type Entity = Run;

    async fn build_entity<S: Session>(
        &self,
        session: &mut S,
        record: Option<RunRecord>,
    ) -> Result<Option<Run>> {
        let Some(record) = record else {
            return Ok(None);
        };

        let package_dependencies = session
            .find_package_dependencies(record.id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        let model_schemas = session
            .find_model_schemas(record.id)
            .await?
            .into_iter()
            .map(Into::into)
            .collect();

        let artifacts = session
            .find_run_artifacts(record.id)
            .await?
            .into_iter()
            .map(RunArtifact::from)
            .collect();

        Ok(Some(Run {
            id: record.id,
            experiment_id: record.experiment_id,
            training_time: record.training_time(),
            git_commit_hash: record.git_commit_hash,
            created_at: record.created_at,
            package_dependencies,
            model_schemas,
            artifacts,
        }))
    }
}

/// Attaches the registered artifact and its fully hydrated run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RegisteredModelResolver {
    runs: RunResolver,
}

impl RegisteredModelResolver {
    pub fn new(runs: RunResolver) -> Self {
        Self { runs }
    }
}

#[async_trait]
impl EntityResolver for RegisteredModelResolver {
    type Record = RegisteredModelRecord;
    type Entity = RegisteredModel;

    async fn build_entity<S: Session>(
        &self,
        session: &mut S,
        record: Option<RegisteredModelRecord>,
    ) -> Result<Option<RegisteredModel>> {
        let Some(record) = record else {
            return Ok(None);
        };

        let run_artifact = session
            .find_run_artifact(record.run_artifact_id)
            .await?
            .map(RunArtifact::from)
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "registered model {} references missing run artifact {}",
                    record.id, record.run_artifact_id
                ))
            })?;

        let run_record = session.find_run(record.run_id).await?;
        let run = self
            .runs
            .build_entity(session, run_record)
            .await?
            .ok_or_else(|| {
                Error::Integrity(format!(
                    "registered model {} references missing run {}",
                    record.id, record.run_id
                ))
            })?;

        Ok(Some(RegisteredModel {
            id: record.id,
            run_artifact_id: record.run_artifact_id,
            run_id: record.run_id,
            experiment_id: record.experiment_id,
            version: record.version,
            registered_by: record.registered_by,
            registered_date: record.registered_date,
            description: record.description,
            run,
            run_artifact,
        }))
    }
}
