use chrono::{DateTime, Utc};
use modelops_core::{ModelSchema, PackageDependency, RunArtifact};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RunRecord {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub git_commit_hash: Option<String>,
    pub training_time_ms: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl RunRecord {
    pub fn training_time(&self) -> Option<Duration> {
        self.training_time_ms
            .map(|ms| Duration::from_millis(u64::try_from(ms).unwrap_or_default()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PackageDependencyRecord {
    pub run_id: Uuid,
    pub position: i32,
    pub name: String,
    pub version: String,
}

impl PackageDependencyRecord {
    /// Rows for `deps` in the order given.
    pub fn for_run(run_id: Uuid, deps: &[PackageDependency]) -> Vec<Self> {
        deps.iter()
            .zip(0..)
            .map(|(dep, position)| Self {
                run_id,
                position,
                name: dep.name.clone(),
                version: dep.version.clone(),
            })
            .collect()
    }
}

impl From<PackageDependencyRecord> for PackageDependency {
    fn from(record: PackageDependencyRecord) -> Self {
        PackageDependency::new(record.name, record.version)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ModelSchemaRecord {
    pub run_id: Uuid,
    pub position: i32,
    pub name: String,
    pub field_type: String,
}

impl ModelSchemaRecord {
    /// Rows for `schemas`; `position` preserves the caller's field order.
    pub fn for_run(run_id: Uuid, schemas: &[ModelSchema]) -> Vec<Self> {
        schemas
            .iter()
            .zip(0..)
            .map(|(schema, position)| Self {
                run_id,
                position,
                name: schema.name.clone(),
                field_type: schema.field_type.clone(),
            })
            .collect()
    }
}

impl From<ModelSchemaRecord> for ModelSchema {
    fn from(record: ModelSchemaRecord) -> Self {
        ModelSchema::new(record.name, record.field_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RunArtifactRecord {
    pub id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl From<RunArtifactRecord> for RunArtifact {
    fn from(record: RunArtifactRecord) -> Self {
        RunArtifact {
            id: record.id,
            run_id: record.run_id,
            name: record.name,
            created_at: record.created_at,
        }
    }
}

impl From<&RunArtifact> for RunArtifactRecord {
    fn from(artifact: &RunArtifact) -> Self {
        Self {
            id: artifact.id,
            run_id: artifact.run_id,
            name: artifact.name.clone(),
            created_at: artifact.created_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct RegisteredModelRecord {
    pub id: Uuid,
    pub run_artifact_id: Uuid,
    pub run_id: Uuid,
    pub experiment_id: Uuid,
    pub registered_by: String,
    pub registered_date: DateTime<Utc>,
    pub description: String,
    pub version: i32,
}

pub(crate) fn duration_to_millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_positions_follow_input_order() {
        let run_id = Uuid::new_v4();
        let rows = ModelSchemaRecord::for_run(
            run_id,
            &[
                ModelSchema::new("petal_width", "float32"),
                ModelSchema::new("petal_length", "float32"),
                ModelSchema::new("species", "string"),
            ],
        );

        let positions: Vec<i32> = rows.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(rows[2].name, "species");
        assert!(rows.iter().all(|r| r.run_id == run_id));
    }

    #[test]
    fn test_training_time_millis() {
        let record = RunRecord {
            id: Uuid::new_v4(),
            experiment_id: Uuid::new_v4(),
            git_commit_hash: None,
            training_time_ms: Some(duration_to_millis(Duration::from_secs(90))),
            created_at: Utc::now(),
        };

        assert_eq!(record.training_time_ms, Some(90_000));
        assert_eq!(record.training_time(), Some(Duration::from_secs(90)));
    }
}
