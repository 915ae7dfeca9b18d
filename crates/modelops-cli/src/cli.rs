use clap::{Parser, Subcommand};
use modelops_core::{ModelSchema, PackageDependency};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "modelops")]
#[command(about = "ModelOps - Run and model registry", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Extra configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize database
    InitDb,

    /// Create a run
    CreateRun {
        /// Experiment ID
        #[arg(long)]
        experiment: Uuid,

        /// Package dependency as name=version (repeatable)
        #[arg(long = "dep")]
        deps: Vec<PackageDependency>,

        /// Git commit hash the run was trained from
        #[arg(long)]
        commit: Option<String>,
    },

    /// Replace the model schema of a run
    SetSchema {
        /// Run ID
        #[arg(long)]
        run: Uuid,

        /// Schema field as name=type (repeatable, order is kept)
        #[arg(long = "field")]
        fields: Vec<ModelSchema>,
    },

    /// Record the training time of a run
    SetTrainingTime {
        /// Run ID
        #[arg(long)]
        run: Uuid,

        /// Training time in seconds
        #[arg(long)]
        seconds: f64,
    },

    /// Show a run by ID or commit hash
    ShowRun {
        /// Run ID
        #[arg(required_unless_present = "commit", conflicts_with = "commit")]
        run_id: Option<Uuid>,

        /// Git commit hash
        #[arg(long)]
        commit: Option<String>,
    },

    /// List the runs of an experiment
    ListRuns {
        /// Experiment ID
        #[arg(long)]
        experiment: Uuid,
    },

    /// Create an artifact for a run
    CreateArtifact {
        /// Run ID
        #[arg(long)]
        run: Uuid,

        /// Artifact name, e.g. model.bin
        #[arg(long)]
        name: String,
    },

    /// List the artifacts of a run
    ListArtifacts {
        /// Run ID
        #[arg(long)]
        run: Uuid,
    },

    /// Register an artifact as the next model version
    RegisterModel {
        /// Experiment ID
        #[arg(long)]
        experiment: Uuid,

        /// Run artifact ID
        #[arg(long)]
        artifact: Uuid,

        /// Who is registering the model
        #[arg(long = "by", env = "USER")]
        registered_by: String,

        /// Model description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// List the registered models of an experiment
    ListModels {
        /// Experiment ID
        #[arg(long)]
        experiment: Uuid,
    },

    /// Show the latest registered model of an experiment
    LatestModel {
        /// Experiment ID
        #[arg(long)]
        experiment: Uuid,
    },

    /// Show one registered model version
    ShowModel {
        /// Experiment ID
        #[arg(long)]
        experiment: Uuid,

        /// Model version
        #[arg(long)]
        version: i32,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_create_run() {
        let experiment = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from([
            "modelops",
            "create-run",
            "--experiment",
            &experiment,
            "--dep",
            "numpy=1.26.0",
            "--dep",
            "torch=2.1.0",
            "--commit",
            "abc123",
        ])
        .unwrap();

        match cli.command {
            Commands::CreateRun { deps, commit, .. } => {
                assert_eq!(deps.len(), 2);
                assert_eq!(deps[1], PackageDependency::new("torch", "2.1.0"));
                assert_eq!(commit.as_deref(), Some("abc123"));
            }
            _ => panic!("expected create-run"),
        }
    }

    #[test]
    fn test_rejects_malformed_dependency() {
        let experiment = Uuid::new_v4().to_string();
        let result = Cli::try_parse_from([
            "modelops",
            "create-run",
            "--experiment",
            &experiment,
            "--dep",
            "numpy",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_show_run_needs_id_or_commit() {
        assert!(Cli::try_parse_from(["modelops", "show-run"]).is_err());
        assert!(Cli::try_parse_from(["modelops", "show-run", "--commit", "abc123"]).is_ok());
    }
}
