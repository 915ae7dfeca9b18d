use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Named output of a run, e.g. `model.bin`. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunArtifact {
    pub id: Uuid,
    pub run_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

impl RunArtifact {
    pub fn new(run_id: Uuid, name: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            run_id,
            name: name.into(),
            created_at,
        }
    }
}
