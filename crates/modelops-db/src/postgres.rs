use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Pool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    config::DatabaseConfig,
    models::{
        ModelSchemaRecord, PackageDependencyRecord, RegisteredModelRecord, RunArtifactRecord,
        RunRecord,
    },
    session::{Session, SessionFactory},
    Error, Result,
};

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";

/// Hands out one Postgres transaction per session.
#[derive(Clone)]
pub struct PgSessionFactory {
    pool: Pool<Postgres>,
}

impl PgSessionFactory {
    /// Create new connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.url)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;

        tracing::info!(
            "Connected to Postgres (max_connections = {})",
            config.max_connections
        );

        Ok(Self { pool })
    }

    pub fn from_pool(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Initialize database schema
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS runs (
                id UUID PRIMARY KEY,
                experiment_id UUID NOT NULL,
                git_commit_hash VARCHAR(255),
                training_time_ms BIGINT,
                created_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS package_dependencies (
                run_id UUID NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                version TEXT NOT NULL,
                PRIMARY KEY (run_id, position),
                FOREIGN KEY (run_id) REFERENCES runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS model_schemas (
                run_id UUID NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                field_type TEXT NOT NULL,
                PRIMARY KEY (run_id, position),
                FOREIGN KEY (run_id) REFERENCES runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS run_artifacts (
                id UUID PRIMARY KEY,
                run_id UUID NOT NULL,
                name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL,
                FOREIGN KEY (run_id) REFERENCES runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS registered_models (
                id UUID PRIMARY KEY,
                run_artifact_id UUID NOT NULL,
                run_id UUID NOT NULL,
                experiment_id UUID NOT NULL,
                registered_by TEXT NOT NULL,
                registered_date TIMESTAMPTZ NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                version INTEGER NOT NULL,
                UNIQUE (experiment_id, version),
                FOREIGN KEY (run_artifact_id) REFERENCES run_artifacts(id),
                FOREIGN KEY (run_id) REFERENCES runs(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Create indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_runs_experiment_id ON runs(experiment_id)")
            .execute(&self.pool)
            .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_runs_git_commit_hash ON runs(git_commit_hash, created_at DESC)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_run_artifacts_run_id ON run_artifacts(run_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[async_trait]
impl SessionFactory for PgSessionFactory {
    type Session = PgSession;

    async fn new_session(&self) -> Result<PgSession> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        tracing::debug!("Opened Postgres session");

        Ok(PgSession { tx })
    }
}

/// A single transaction. Rolled back by sqlx when dropped uncommitted.
pub struct PgSession {
    tx: Transaction<'static, Postgres>,
}

fn database_error_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
        _ => None,
    }
}

#[async_trait]
impl Session for PgSession {
    async fn insert_run(&mut self, run: &RunRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (id, experiment_id, git_commit_hash, training_time_ms, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(run.id)
        .bind(run.experiment_id)
        .bind(&run.git_commit_hash)
        .bind(run.training_time_ms)
        .bind(run.created_at)
        .execute(&mut *self.tx)
        .await?;

        Ok(())
    }

    async fn find_run(&mut self, run_id: Uuid) -> Result<Option<RunRecord>> {
        let record = sqlx::query_as::<_, RunRecord>("SELECT * FROM runs WHERE id = $1")
            .bind(run_id)
            .fetch_optional(&mut *self.tx)
            .await?;

        Ok(record)
    }

    async fn find_latest_run_by_commit_hash(&mut self, hash: &str) -> Result<Option<RunRecord>> {
        let record = sqlx::query_as::<_, RunRecord>(
            r#"
            SELECT * FROM runs
            WHERE git_commit_hash = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(hash)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn find_runs_by_experiment(&mut self, experiment_id: Uuid) -> Result<Vec<RunRecord>> {
        let records = sqlx::query_as::<_, RunRecord>(
            "SELECT * FROM runs WHERE experiment_id = $1 ORDER BY created_at, id",
        )
        .bind(experiment_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn update_training_time(&mut self, run_id: Uuid, training_time_ms: i64) -> Result<()> {
        let result = sqlx::query("UPDATE runs SET training_time_ms = $1 WHERE id = $2")
            .bind(training_time_ms)
            .bind(run_id)
            .execute(&mut *self.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(Error::RunNotFound(run_id));
        }

        Ok(())
    }

    async fn insert_package_dependencies(
        &mut self,
        deps: &[PackageDependencyRecord],
    ) -> Result<()> {
        for dep in deps {
            sqlx::query(
                r#"
                INSERT INTO package_dependencies (run_id, position, name, version)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(dep.run_id)
            .bind(dep.position)
            .bind(&dep.name)
            .bind(&dep.version)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match database_error_code(&e).as_deref() {
                Some(FOREIGN_KEY_VIOLATION) => Error::RunNotFound(dep.run_id),
                _ => Error::Sqlx(e),
            })?;
        }

        Ok(())
    }

    async fn find_package_dependencies(
        &mut self,
        run_id: Uuid,
    ) -> Result<Vec<PackageDependencyRecord>> {
        let records = sqlx::query_as::<_, PackageDependencyRecord>(
            "SELECT * FROM package_dependencies WHERE run_id = $1 ORDER BY position",
        )
        .bind(run_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn replace_model_schemas(
        &mut self,
        run_id: Uuid,
        schemas: &[ModelSchemaRecord],
    ) -> Result<()> {
        sqlx::query("DELETE FROM model_schemas WHERE run_id = $1")
            .bind(run_id)
            .execute(&mut *self.tx)
            .await?;

        for schema in schemas {
            sqlx::query(
                r#"
                INSERT INTO model_schemas (run_id, position, name, field_type)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(run_id)
            .bind(schema.position)
            .bind(&schema.name)
            .bind(&schema.field_type)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| match database_error_code(&e).as_deref() {
                Some(FOREIGN_KEY_VIOLATION) => Error::RunNotFound(run_id),
                _ => Error::Sqlx(e),
            })?;
        }

        Ok(())
    }

    async fn find_model_schemas(&mut self, run_id: Uuid) -> Result<Vec<ModelSchemaRecord>> {
        let records = sqlx::query_as::<_, ModelSchemaRecord>(
            "SELECT * FROM model_schemas WHERE run_id = $1 ORDER BY position",
        )
        .bind(run_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn insert_run_artifact(&mut self, artifact: &RunArtifactRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO run_artifacts (id, run_id, name, created_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(artifact.id)
        .bind(artifact.run_id)
        .bind(&artifact.name)
        .bind(artifact.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match database_error_code(&e).as_deref() {
            Some(FOREIGN_KEY_VIOLATION) => Error::RunNotFound(artifact.run_id),
            _ => Error::Sqlx(e),
        })?;

        Ok(())
    }

    async fn find_run_artifact(
        &mut self,
        artifact_id: Uuid,
    ) -> Result<Option<RunArtifactRecord>> {
        let record =
            sqlx::query_as::<_, RunArtifactRecord>("SELECT * FROM run_artifacts WHERE id = $1")
                .bind(artifact_id)
                .fetch_optional(&mut *self.tx)
                .await?;

        Ok(record)
    }

    async fn find_run_artifacts(&mut self, run_id: Uuid) -> Result<Vec<RunArtifactRecord>> {
        let records = sqlx::query_as::<_, RunArtifactRecord>(
            "SELECT * FROM run_artifacts WHERE run_id = $1 ORDER BY created_at, id",
        )
        .bind(run_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn max_registered_model_version(&mut self, experiment_id: Uuid) -> Result<Option<i32>> {
        let version: Option<i32> = sqlx::query_scalar(
            "SELECT MAX(version) FROM registered_models WHERE experiment_id = $1",
        )
        .bind(experiment_id)
        .fetch_one(&mut *self.tx)
        .await?;

        Ok(version)
    }

    async fn insert_registered_model(&mut self, model: &RegisteredModelRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO registered_models (
                id, run_artifact_id, run_id, experiment_id,
                registered_by, registered_date, description, version
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(model.id)
        .bind(model.run_artifact_id)
        .bind(model.run_id)
        .bind(model.experiment_id)
        .bind(&model.registered_by)
        .bind(model.registered_date)
        .bind(&model.description)
        .bind(model.version)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match database_error_code(&e).as_deref() {
            Some(UNIQUE_VIOLATION) => Error::VersionConflict {
                experiment_id: model.experiment_id,
                version: model.version,
            },
            Some(FOREIGN_KEY_VIOLATION) => Error::RunArtifactNotFound(model.run_artifact_id),
            _ => Error::Sqlx(e),
        })?;

        Ok(())
    }

    async fn find_registered_models(
        &mut self,
        experiment_id: Uuid,
    ) -> Result<Vec<RegisteredModelRecord>> {
        let records = sqlx::query_as::<_, RegisteredModelRecord>(
            "SELECT * FROM registered_models WHERE experiment_id = $1 ORDER BY version",
        )
        .bind(experiment_id)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(records)
    }

    async fn find_registered_model(
        &mut self,
        experiment_id: Uuid,
        version: i32,
    ) -> Result<Option<RegisteredModelRecord>> {
        let record = sqlx::query_as::<_, RegisteredModelRecord>(
            "SELECT * FROM registered_models WHERE experiment_id = $1 AND version = $2",
        )
        .bind(experiment_id)
        .bind(version)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn find_latest_registered_model(
        &mut self,
        experiment_id: Uuid,
    ) -> Result<Option<RegisteredModelRecord>> {
        let record = sqlx::query_as::<_, RegisteredModelRecord>(
            r#"
            SELECT * FROM registered_models
            WHERE experiment_id = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(experiment_id)
        .fetch_optional(&mut *self.tx)
        .await?;

        Ok(record)
    }

    async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        tracing::debug!("Committed Postgres session");

        Ok(())
    }
}
