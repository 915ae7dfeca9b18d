//! In-process backend for tests.
//!
//! Opening a session copies the whole store, and so does every commit, so
//! each operation costs time proportional to the store size. Keep it to test
//! fixtures and small data sets.
//!
//! Each session reads from a snapshot taken when it opened and records its
//! writes in a log. `commit` replays the log against the current shared state
//! under the write lock, enforcing the same constraints the Postgres schema
//! does, and swaps the result in only if every write applied.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    models::{
        ModelSchemaRecord, PackageDependencyRecord, RegisteredModelRecord, RunArtifactRecord,
        RunRecord,
    },
    session::{Session, SessionFactory},
    Error, Result,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    runs: HashMap<Uuid, RunRecord>,
    package_dependencies: HashMap<Uuid, Vec<PackageDependencyRecord>>,
    model_schemas: HashMap<Uuid, Vec<ModelSchemaRecord>>,
    run_artifacts: HashMap<Uuid, RunArtifactRecord>,
    registered_models: HashMap<Uuid, RegisteredModelRecord>,
}

#[derive(Debug, Clone)]
enum Write {
    InsertRun(RunRecord),
    SetTrainingTime { run_id: Uuid, training_time_ms: i64 },
    InsertPackageDependencies(Vec<PackageDependencyRecord>),
    ReplaceModelSchemas {
        run_id: Uuid,
        schemas: Vec<ModelSchemaRecord>,
    },
    InsertRunArtifact(RunArtifactRecord),
    InsertRegisteredModel(RegisteredModelRecord),
}

impl Tables {
    fn require_run(&self, run_id: Uuid) -> Result<()> {
        if self.runs.contains_key(&run_id) {
            Ok(())
        } else {
            Err(Error::RunNotFound(run_id))
        }
    }

    fn apply(&mut self, write: Write) -> Result<()> {
        match write {
            Write::InsertRun(run) => {
                if self.runs.contains_key(&run.id) {
                    return Err(Error::Query(format!("duplicate run id {}", run.id)));
                }
                self.runs.insert(run.id, run);
            }
            Write::SetTrainingTime {
                run_id,
                training_time_ms,
            } => {
                let run = self
                    .runs
                    .get_mut(&run_id)
                    .ok_or(Error::RunNotFound(run_id))?;
                run.training_time_ms = Some(training_time_ms);
            }
            Write::InsertPackageDependencies(deps) => {
                for dep in deps {
                    self.require_run(dep.run_id)?;
                    self.package_dependencies
                        .entry(dep.run_id)
                        .or_default()
                        .push(dep);
                }
            }
            Write::ReplaceModelSchemas { run_id, schemas } => {
                self.require_run(run_id)?;
                self.model_schemas.insert(run_id, schemas);
            }
            Write::InsertRunArtifact(artifact) => {
                self.require_run(artifact.run_id)?;
                if self.run_artifacts.contains_key(&artifact.id) {
                    return Err(Error::Query(format!(
                        "duplicate run artifact id {}",
                        artifact.id
                    )));
                }
                self.run_artifacts.insert(artifact.id, artifact);
            }
            Write::InsertRegisteredModel(model) => {
                if !self.run_artifacts.contains_key(&model.run_artifact_id) {
                    return Err(Error::RunArtifactNotFound(model.run_artifact_id));
                }
                self.require_run(model.run_id)?;
                let taken = self.registered_models.values().any(|existing| {
                    existing.experiment_id == model.experiment_id
                        && existing.version == model.version
                });
                if taken {
                    return Err(Error::VersionConflict {
                        experiment_id: model.experiment_id,
                        version: model.version,
                    });
                }
                self.registered_models.insert(model.id, model);
            }
        }

        Ok(())
    }
}

/// Shared in-memory store. Clones share the same tables.
#[derive(Debug, Clone, Default)]
pub struct MemorySessionFactory {
    tables: Arc<RwLock<Tables>>,
}

impl MemorySessionFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionFactory for MemorySessionFactory {
    type Session = MemorySession;

    async fn new_session(&self) -> Result<MemorySession> {
        let snapshot = self.tables.read().await.clone();
        tracing::debug!("Opened memory session ({} runs)", snapshot.runs.len());

        Ok(MemorySession {
            shared: Arc::clone(&self.tables),
            snapshot,
            pending: Vec::new(),
        })
    }
}

pub struct MemorySession {
    shared: Arc<RwLock<Tables>>,
    snapshot: Tables,
    pending: Vec<Write>,
}

impl MemorySession {
    fn write(&mut self, write: Write) -> Result<()> {
        self.snapshot.apply(write.clone())?;
        self.pending.push(write);
        Ok(())
    }
}

#[async_trait]
impl Session for MemorySession {
    async fn insert_run(&mut self, run: &RunRecord) -> Result<()> {
        self.write(Write::InsertRun(run.clone()))
    }

    async fn find_run(&mut self, run_id: Uuid) -> Result<Option<RunRecord>> {
        Ok(self.snapshot.runs.get(&run_id).cloned())
    }

    async fn find_latest_run_by_commit_hash(&mut self, hash: &str) -> Result<Option<RunRecord>> {
        let latest = self
            .snapshot
            .runs
            .values()
            .filter(|run| run.git_commit_hash.as_deref() == Some(hash))
            .max_by_key(|run| (run.created_at, run.id))
            .cloned();

        Ok(latest)
    }

    async fn find_runs_by_experiment(&mut self, experiment_id: Uuid) -> Result<Vec<RunRecord>> {
        let mut runs: Vec<RunRecord> = self
            .snapshot
            .runs
            .values()
            .filter(|run| run.experiment_id == experiment_id)
            .cloned()
            .collect();
        runs.sort_by_key(|run| (run.created_at, run.id));

        Ok(runs)
    }

    async fn update_training_time(&mut self, run_id: Uuid, training_time_ms: i64) -> Result<()> {
        self.write(Write::SetTrainingTime {
            run_id,
            training_time_ms,
        })
    }

    async fn insert_package_dependencies(
        &mut self,
        deps: &[PackageDependencyRecord],
    ) -> Result<()> {
        self.write(Write::InsertPackageDependencies(deps.to_vec()))
    }

    async fn find_package_dependencies(
        &mut self,
        run_id: Uuid,
    ) -> Result<Vec<PackageDependencyRecord>> {
        let mut deps = self
            .snapshot
            .package_dependencies
            .get(&run_id)
            .cloned()
            .unwrap_or_default();
        deps.sort_by_key(|dep| dep.position);

        Ok(deps)
    }

    async fn replace_model_schemas(
        &mut self,
        run_id: Uuid,
        schemas: &[ModelSchemaRecord],
    ) -> Result<()> {
        self.write(Write::ReplaceModelSchemas {
            run_id,
            schemas: schemas.to_vec(),
        })
    }

    async fn find_model_schemas(&mut self, run_id: Uuid) -> Result<Vec<ModelSchemaRecord>> {
        let mut schemas = self
            .snapshot
            .model_schemas
            .get(&run_id)
            .cloned()
            .unwrap_or_default();
        schemas.sort_by_key(|schema| schema.position);

        Ok(schemas)
    }

    async fn insert_run_artifact(&mut self, artifact: &RunArtifactRecord) -> Result<()> {
        self.write(Write::InsertRunArtifact(artifact.clone()))
    }

    async fn find_run_artifact(
        &mut self,
        artifact_id: Uuid,
    ) -> Result<Option<RunArtifactRecord>> {
        Ok(self.snapshot.run_artifacts.get(&artifact_id).cloned())
    }

    async fn find_run_artifacts(&mut self, run_id: Uuid) -> Result<Vec<RunArtifactRecord>> {
        let mut artifacts: Vec<RunArtifactRecord> = self
            .snapshot
            .run_artifacts
            .values()
            .filter(|artifact| artifact.run_id == run_id)
            .cloned()
            .collect();
        artifacts.sort_by_key(|artifact| (artifact.created_at, artifact.id));

        Ok(artifacts)
    }

    async fn max_registered_model_version(&mut self, experiment_id: Uuid) -> Result<Option<i32>> {
        let max = self
            .snapshot
            .registered_models
            .values()
            .filter(|model| model.experiment_id == experiment_id)
            .map(|model| model.version)
            .max();

        Ok(max)
    }

    async fn insert_registered_model(&mut self, model: &RegisteredModelRecord) -> Result<()> {
        self.write(Write::InsertRegisteredModel(model.clone()))
    }

    async fn find_registered_models(
        &mut self,
        experiment_id: Uuid,
    ) -> Result<Vec<RegisteredModelRecord>> {
        let mut models: Vec<RegisteredModelRecord> = self
            .snapshot
            .registered_models
            .values()
            .filter(|model| model.experiment_id == experiment_id)
            .cloned()
            .collect();
        models.sort_by_key(|model| model.version);

        Ok(models)
    }

    async fn find_registered_model(
        &mut self,
        experiment_id: Uuid,
        version: i32,
    ) -> Result<Option<RegisteredModelRecord>> {
        let model = self
            .snapshot
            .registered_models
            .values()
            .find(|model| model.experiment_id == experiment_id && model.version == version)
            .cloned();

        Ok(model)
    }

    async fn find_latest_registered_model(
        &mut self,
        experiment_id: Uuid,
    ) -> Result<Option<RegisteredModelRecord>> {
        let latest = self
            .snapshot
            .registered_models
            .values()
            .filter(|model| model.experiment_id == experiment_id)
            .max_by_key(|model| model.version)
            .cloned();

        Ok(latest)
    }

    async fn commit(self) -> Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let writes = self.pending.len();
        let mut shared = self.shared.write().await;
        let mut next = shared.clone();
        for write in self.pending {
            next.apply(write)?;
        }
        *shared = next;

        tracing::debug!("Committed memory session ({} writes)", writes);

        Ok(())
    }
}
