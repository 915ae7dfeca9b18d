use anyhow::{anyhow, Result};
use serde::Serialize;
use std::time::Duration;

use crate::cli::Commands;
use modelops_core::{RegisteredModel, Run, RunArtifact};
use modelops_db::{PgSessionFactory, RunRepository};

pub async fn execute(
    command: Commands,
    sessions: &PgSessionFactory,
    repository: &RunRepository<PgSessionFactory>,
    json: bool,
) -> Result<()> {
    match command {
        Commands::InitDb => {
            sessions.init_schema().await?;
            tracing::info!("Database schema ready");
            println!("✓ Database schema initialized");
        }

        Commands::CreateRun {
            experiment,
            deps,
            commit,
        } => {
            let run = repository
                .create_run(experiment, deps, commit.as_deref())
                .await?;

            if json {
                print_json(&run)?;
            } else {
                println!("✓ Run created: {}", run.id);
                print_run(&run);
            }
        }

        Commands::SetSchema { run, fields } => {
            let count = fields.len();
            repository.set_model_schema(run, fields).await?;
            println!("✓ Schema of run {} set ({} fields)", run, count);
        }

        Commands::SetTrainingTime { run, seconds } => {
            let training_time = Duration::try_from_secs_f64(seconds)
                .map_err(|e| anyhow!("invalid training time {}: {}", seconds, e))?;
            repository.set_training_time(run, training_time).await?;
            println!("✓ Training time of run {} set to {:?}", run, training_time);
        }

        Commands::ShowRun { run_id, commit } => {
            let run = match (run_id, commit) {
                (Some(id), _) => repository.get_run(id).await?,
                (None, Some(hash)) => repository.get_run_by_commit_hash(&hash).await?,
                (None, None) => return Err(anyhow!("either a run ID or --commit is required")),
            };

            match run {
                Some(run) if json => print_json(&run)?,
                Some(run) => print_run(&run),
                None => println!("Run not found"),
            }
        }

        Commands::ListRuns { experiment } => {
            let runs = repository.get_runs(experiment).await?;

            if json {
                print_json(&runs)?;
            } else if runs.is_empty() {
                println!("No runs for experiment {}", experiment);
            } else {
                println!("Runs ({}):", runs.len());
                for run in &runs {
                    print_run(run);
                    println!();
                }
            }
        }

        Commands::CreateArtifact { run, name } => {
            let artifact = repository.create_run_artifact(run, &name).await?;

            if json {
                print_json(&artifact)?;
            } else {
                println!("✓ Artifact created: {}", artifact.id);
                print_artifact(&artifact);
            }
        }

        Commands::ListArtifacts { run } => {
            let artifacts = repository.get_run_artifacts(run).await?;

            if json {
                print_json(&artifacts)?;
            } else {
                println!("Artifacts ({}):", artifacts.len());
                for artifact in &artifacts {
                    print_artifact(artifact);
                }
            }
        }

        Commands::RegisterModel {
            experiment,
            artifact,
            registered_by,
            description,
        } => {
            let model = repository
                .register_model(experiment, artifact, &registered_by, &description)
                .await?;

            if json {
                print_json(&model)?;
            } else {
                println!("✓ Registered model version {}", model.version);
                print_model(&model);
            }
        }

        Commands::ListModels { experiment } => {
            let models = repository.get_registered_models(experiment).await?;

            if json {
                print_json(&models)?;
            } else if models.is_empty() {
                println!("No registered models for experiment {}", experiment);
            } else {
                for model in &models {
                    print_model(model);
                    println!();
                }
            }
        }

        Commands::LatestModel { experiment } => {
            match repository.get_latest_registered_model(experiment).await? {
                Some(model) if json => print_json(&model)?,
                Some(model) => print_model(&model),
                None => println!("No registered models for experiment {}", experiment),
            }
        }

        Commands::ShowModel {
            experiment,
            version,
        } => match repository.get_registered_model(experiment, version).await? {
            Some(model) if json => print_json(&model)?,
            Some(model) => print_model(&model),
            None => println!("Version {} not found for experiment {}", version, experiment),
        },
    }

    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_run(run: &Run) {
    println!("Run: {}", run.id);
    println!("  Experiment: {}", run.experiment_id);
    println!("  Created: {}", run.created_at);
    if let Some(hash) = &run.git_commit_hash {
        println!("  Commit: {}", hash);
    }
    if let Some(training_time) = run.training_time {
        println!("  Training time: {:?}", training_time);
    }
    if !run.package_dependencies.is_empty() {
        println!("  Dependencies:");
        for dep in &run.package_dependencies {
            println!("    {} {}", dep.name, dep.version);
        }
    }
    if !run.model_schemas.is_empty() {
        println!("  Schema:");
        for field in &run.model_schemas {
            println!("    {}: {}", field.name, field.field_type);
        }
    }
    if !run.artifacts.is_empty() {
        println!("  Artifacts:");
        for artifact in &run.artifacts {
            println!("    {} ({})", artifact.name, artifact.id);
        }
    }
}

fn print_artifact(artifact: &RunArtifact) {
    println!("  {} ({}) created {}", artifact.name, artifact.id, artifact.created_at);
}

fn print_model(model: &RegisteredModel) {
    println!("Model version {}: {}", model.version, model.id);
    println!("  Experiment: {}", model.experiment_id);
    println!("  Run: {}", model.run_id);
    println!(
        "  Artifact: {} ({})",
        model.run_artifact.name, model.run_artifact_id
    );
    println!("  Registered by: {}", model.registered_by);
    println!("  Registered: {}", model.registered_date);
    if !model.description.is_empty() {
        println!("  Description: {}", model.description);
    }
}
