//! Repository scenarios shared by every backend's test suite.

#![allow(dead_code)]

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use modelops_core::{FixedClock, ModelSchema, PackageDependency};
use modelops_db::{Error, RepositoryConfig, RunRepository, SessionFactory};
use std::collections::HashSet;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};
use uuid::Uuid;

pub async fn create_then_get_run<F: SessionFactory>(repo: &RunRepository<F>) {
    let experiment_id = Uuid::new_v4();
    let deps = vec![
        PackageDependency::new("numpy", "1.26.0"),
        PackageDependency::new("torch", "2.1.0"),
    ];

    let run = assert_ok!(repo.create_run(experiment_id, deps.clone(), None).await);
    let fetched = assert_ok!(repo.get_run(run.id).await).expect("run should exist");

    assert_eq!(fetched.id, run.id);
    assert_eq!(fetched.experiment_id, experiment_id);
    assert_eq!(fetched.package_dependencies, deps);
    assert!(fetched.artifacts.is_empty());
    assert!(fetched.model_schemas.is_empty());
}

pub async fn artifact_round_trip<F: SessionFactory>(repo: &RunRepository<F>) {
    let run = assert_ok!(repo.create_run(Uuid::new_v4(), vec![], None).await);

    let artifact = assert_ok!(repo.create_run_artifact(run.id, "model.bin").await);
    let artifacts = assert_ok!(repo.get_run_artifacts(run.id).await);

    assert_eq!(artifacts.len(), 1);
    assert_eq!(artifacts[0].id, artifact.id);
    assert_eq!(artifacts[0].run_id, run.id);
    assert_eq!(artifacts[0].name, "model.bin");

    let hydrated = assert_ok!(repo.get_run(run.id).await).expect("run should exist");
    let names: Vec<&str> = hydrated.artifacts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["model.bin"]);

    let err = assert_err!(repo.create_run_artifact(Uuid::new_v4(), "orphan.bin").await);
    assert!(matches!(err, Error::RunNotFound(_)));
}

pub async fn register_unknown_artifact_fails<F: SessionFactory>(repo: &RunRepository<F>) {
    let experiment_id = Uuid::new_v4();
    let missing = Uuid::new_v4();

    let err = assert_err!(repo.register_model(experiment_id, missing, "alice", "").await);

    assert!(matches!(err, Error::RunArtifactNotFound(id) if id == missing));
    assert!(err.is_not_found());
    assert!(assert_ok!(repo.get_registered_models(experiment_id).await).is_empty());
    assert!(assert_ok!(repo.get_latest_registered_model(experiment_id).await).is_none());
}

pub async fn training_time<F: SessionFactory>(repo: &RunRepository<F>) {
    let err = assert_err!(
        repo.set_training_time(Uuid::new_v4(), Duration::from_secs(5))
            .await
    );
    assert!(matches!(err, Error::RunNotFound(_)));

    let run = assert_ok!(repo.create_run(Uuid::new_v4(), vec![], None).await);
    assert_ok!(
        repo.set_training_time(run.id, Duration::from_millis(12_345))
            .await
    );

    let fetched = assert_ok!(repo.get_run(run.id).await).expect("run should exist");
    assert_eq!(fetched.training_time, Some(Duration::from_millis(12_345)));
}

pub async fn latest_registered_model<F: SessionFactory>(repo: &RunRepository<F>) {
    let experiment_id = Uuid::new_v4();
    assert!(assert_ok!(repo.get_latest_registered_model(experiment_id).await).is_none());

    let run = assert_ok!(repo.create_run(experiment_id, vec![], None).await);
    for i in 0..3 {
        let artifact = assert_ok!(
            repo.create_run_artifact(run.id, &format!("model-{}.bin", i))
                .await
        );
        assert_ok!(
            repo.register_model(experiment_id, artifact.id, "alice", "nightly")
                .await
        );
    }

    let latest = assert_ok!(repo.get_latest_registered_model(experiment_id).await)
        .expect("three registrations exist");
    assert_eq!(latest.version, 3);
    assert_eq!(latest.run_artifact.name, "model-2.bin");
    assert_eq!(latest.run.id, run.id);
    assert_eq!(latest.experiment_id, experiment_id);

    let versions: Vec<i32> = assert_ok!(repo.get_registered_models(experiment_id).await)
        .iter()
        .map(|model| model.version)
        .collect();
    assert_eq!(versions, vec![1, 2, 3]);

    let second = assert_ok!(repo.get_registered_model(experiment_id, 2).await)
        .expect("version 2 exists");
    assert_eq!(second.run_artifact.name, "model-1.bin");
    assert!(assert_ok!(repo.get_registered_model(experiment_id, 4).await).is_none());
}

pub async fn versions_are_scoped_per_experiment<F: SessionFactory>(repo: &RunRepository<F>) {
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    for experiment_id in [first, first, second] {
        let run = assert_ok!(repo.create_run(experiment_id, vec![], None).await);
        let artifact = assert_ok!(repo.create_run_artifact(run.id, "model.bin").await);
        assert_ok!(repo.register_model(experiment_id, artifact.id, "ci", "").await);
    }

    let latest_first = assert_ok!(repo.get_latest_registered_model(first).await).unwrap();
    let latest_second = assert_ok!(repo.get_latest_registered_model(second).await).unwrap();
    assert_eq!(latest_first.version, 2);
    assert_eq!(latest_second.version, 1);
}

pub async fn hydration_round_trip<F: SessionFactory>(repo: &RunRepository<F>) {
    let deps = vec![
        PackageDependency::new("pandas", "2.2.0"),
        PackageDependency::new("xgboost", "2.0.3"),
    ];
    let run = assert_ok!(repo.create_run(Uuid::new_v4(), deps.clone(), Some("cafe01")).await);

    assert_ok!(
        repo.set_model_schema(run.id, vec![ModelSchema::new("stale", "bool")])
            .await
    );

    let schema = vec![
        ModelSchema::new("sepal_length", "float32"),
        ModelSchema::new("sepal_width", "float32"),
        ModelSchema::new("species", "string"),
    ];
    assert_ok!(repo.set_model_schema(run.id, schema.clone()).await);

    let fetched = assert_ok!(repo.get_run(run.id).await).expect("run should exist");

    let expected: HashSet<_> = deps.into_iter().collect();
    let actual: HashSet<_> = fetched.package_dependencies.into_iter().collect();
    assert_eq!(actual, expected);
    assert_eq!(fetched.model_schemas, schema);
    assert_eq!(fetched.git_commit_hash.as_deref(), Some("cafe01"));
}

pub async fn runs_of_experiment<F: SessionFactory>(repo: &RunRepository<F>) {
    let experiment_id = Uuid::new_v4();
    let a = assert_ok!(repo.create_run(experiment_id, vec![], None).await);
    let b = assert_ok!(repo.create_run(experiment_id, vec![], None).await);
    assert_ok!(repo.create_run(Uuid::new_v4(), vec![], None).await);

    let ids: HashSet<Uuid> = assert_ok!(repo.get_runs(experiment_id).await)
        .into_iter()
        .map(|run| run.id)
        .collect();

    assert_eq!(ids, HashSet::from([a.id, b.id]));
    assert!(assert_ok!(repo.get_runs(Uuid::new_v4()).await).is_empty());
}

/// Two runs share a hash; the later one wins regardless of insert order.
pub async fn commit_hash_prefers_most_recent<F: SessionFactory + Clone>(sessions: F) {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let earlier = RunRepository::with_clock(sessions.clone(), FixedClock::new(base));
    let later = RunRepository::with_clock(
        sessions,
        FixedClock::new(base + ChronoDuration::hours(1)),
    );
    let hash = format!("shared-{}", Uuid::new_v4().simple());
    let experiment_id = Uuid::new_v4();

    let newest = assert_ok!(later.create_run(experiment_id, vec![], Some(&hash)).await);
    assert_ok!(earlier.create_run(experiment_id, vec![], Some(&hash)).await);

    let found = assert_ok!(earlier.get_run_by_commit_hash(&hash).await).expect("hash exists");
    assert_eq!(found.id, newest.id);
}

/// Runs created at the same instant with one hash resolve to the higher id.
pub async fn commit_hash_tie_breaks_on_id<F: SessionFactory>(sessions: F) {
    let instant = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
    let repo = RunRepository::with_clock(sessions, FixedClock::new(instant));
    let hash = format!("tied-{}", Uuid::new_v4().simple());
    let experiment_id = Uuid::new_v4();

    let mut ids = Vec::new();
    for _ in 0..4 {
        let run = assert_ok!(repo.create_run(experiment_id, vec![], Some(&hash)).await);
        assert_eq!(run.created_at, instant);
        ids.push(run.id);
    }

    let found = assert_ok!(repo.get_run_by_commit_hash(&hash).await).expect("hash exists");
    assert_eq!(Some(found.id), ids.into_iter().max());
}

/// Many writers register against one experiment at once; every one of them
/// must get a distinct version and together they must cover 1..=n.
pub async fn concurrent_registrations_are_gapless<F>(sessions: F, writers: u32)
where
    F: SessionFactory + Clone + 'static,
{
    let repo = RunRepository::new(sessions).with_config(RepositoryConfig {
        max_register_attempts: writers + 1,
        register_retry_backoff_ms: 1,
    });
    let experiment_id = Uuid::new_v4();
    let run = assert_ok!(repo.create_run(experiment_id, vec![], None).await);

    let mut artifacts = Vec::new();
    for i in 0..writers {
        let artifact = assert_ok!(
            repo.create_run_artifact(run.id, &format!("candidate-{}.bin", i))
                .await
        );
        artifacts.push(artifact.id);
    }

    let handles: Vec<_> = artifacts
        .into_iter()
        .map(|artifact_id| {
            let repo = repo.clone();
            tokio::spawn(async move {
                repo.register_model(experiment_id, artifact_id, "worker", "")
                    .await
            })
        })
        .collect();

    let mut versions = Vec::new();
    for handle in handles {
        let model = assert_ok!(handle.await.expect("registration task panicked"));
        versions.push(model.version);
    }
    versions.sort_unstable();

    let expected: Vec<i32> = (1..=writers as i32).collect();
    assert_eq!(versions, expected);

    let stored: Vec<i32> = assert_ok!(repo.get_registered_models(experiment_id).await)
        .iter()
        .map(|model| model.version)
        .collect();
    assert_eq!(stored, expected);
}
