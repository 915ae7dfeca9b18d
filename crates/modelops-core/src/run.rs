use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use uuid::Uuid;

use crate::{Error, Result, RunArtifact};

/// A package the run was trained against.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageDependency {
    pub name: String,
    pub version: String,
}

impl PackageDependency {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }
}

impl FromStr for PackageDependency {
    type Err = Error;

    /// Parses `name=version`
    fn from_str(s: &str) -> Result<Self> {
        let (name, version) = split_pair(s, "package dependency")?;
        Ok(Self::new(name, version))
    }
}

/// One input or output field of the model produced by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
        }
    }
}

impl FromStr for ModelSchema {
    type Err = Error;

    /// Parses `field=type`
    fn from_str(s: &str) -> Result<Self> {
        let (name, field_type) = split_pair(s, "model schema field")?;
        Ok(Self::new(name, field_type))
    }
}

fn split_pair<'a>(s: &'a str, what: &str) -> Result<(&'a str, &'a str)> {
    match s.split_once('=') {
        Some((left, right)) if !left.trim().is_empty() && !right.trim().is_empty() => {
            Ok((left.trim(), right.trim()))
        }
        _ => Err(Error::InvalidArgument(format!(
            "Expected {} as name=value, got '{}'",
            what, s
        ))),
    }
}

/// A single training run and everything hanging off it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: Uuid,
    pub experiment_id: Uuid,
    pub git_commit_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub training_time: Option<Duration>,
    pub package_dependencies: Vec<PackageDependency>,
    pub model_schemas: Vec<ModelSchema>,
    pub artifacts: Vec<RunArtifact>,
}

impl Run {
    pub fn new(experiment_id: Uuid, created_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            experiment_id,
            git_commit_hash: None,
            created_at,
            training_time: None,
            package_dependencies: Vec::new(),
            model_schemas: Vec::new(),
            artifacts: Vec::new(),
        }
    }

    /// Empty hashes are treated as "no commit".
    pub fn with_git_commit_hash(mut self, hash: Option<&str>) -> Self {
        self.git_commit_hash = normalize_commit_hash(hash);
        self
    }

    pub fn with_package_dependencies(mut self, deps: Vec<PackageDependency>) -> Self {
        self.package_dependencies = deps;
        self
    }
}

pub fn normalize_commit_hash(hash: Option<&str>) -> Option<String> {
    hash.map(str::trim)
        .filter(|h| !h.is_empty())
        .map(str::to_string)
}
