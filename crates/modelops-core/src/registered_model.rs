use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, Run, RunArtifact};

/// A versioned promotion of a run artifact.
///
/// `run_id` and `experiment_id` are copies of what the artifact's run already
/// points at; they are kept for querying by experiment without a join and are
/// always derived from `run_artifact` when a registration is written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredModel {
    pub id: Uuid,
    pub run_artifact_id: Uuid,
    pub run_id: Uuid,
    pub experiment_id: Uuid,
    pub version: i32,
    pub registered_by: String,
    pub registered_date: DateTime<Utc>,
    pub description: String,
    pub run: Run,
    pub run_artifact: RunArtifact,
}

impl RegisteredModel {
    /// Version given to the first registration of an experiment.
    pub const FIRST_VERSION: i32 = 1;

    /// Version that follows `latest`, or the first version when there is none.
    pub fn next_version(latest: Option<i32>) -> Result<i32> {
        match latest {
            None => Ok(Self::FIRST_VERSION),
            Some(v) => v.checked_add(1).ok_or(Error::VersionOverflow(v)),
        }
    }
}
