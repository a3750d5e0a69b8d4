//! Credit pipeline entry point

use clap::{Parser, Subcommand};
use polars::prelude::*;
use std::path::{Path, PathBuf};

use credit_pipeline::config::{DataConfig, FeatureConfig, TrainingConfig};
use credit_pipeline::inference::{LoanApplication, ScoringService};
use credit_pipeline::pipeline::{Orchestrator, PipelineLayout};
use credit_pipeline::registry::GateDecision;

#[derive(Parser)]
#[command(name = "credit-pipeline", about = "Credit risk scoring pipeline", version)]
struct Cli {
    /// Root directory for datasets, models, and reports
    #[arg(long, default_value = "artifacts", global = true)]
    root: PathBuf,

    /// Directory holding data.yaml, features.yaml, training.yaml
    #[arg(long, default_value = "configs", global = true)]
    configs: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full training pipeline on a labeled CSV
    Run {
        /// Input CSV of labeled loan applications
        #[arg(long)]
        data: PathBuf,
    },
    /// Run the drift monitors and the alert scan
    Monitor,
    /// Score a batch CSV of applications with the production model
    Predict {
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        output: PathBuf,
    },
    /// Score a single application given as a JSON file
    Score {
        #[arg(long)]
        application: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "credit_pipeline=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let layout = PipelineLayout::under(&cli.root);

    match cli.command {
        Commands::Run { data } => {
            let (data_cfg, feat_cfg, train_cfg) = load_configs(&cli.configs)?;
            let raw = read_csv(&data)?;
            let mut orchestrator = Orchestrator::new(layout, data_cfg, feat_cfg, train_cfg)
                .with_training_config_path(cli.configs.join("training.yaml"));
            let outcome = orchestrator.run(raw)?;

            match &outcome.decision {
                GateDecision::Promoted { version, f1_score } => {
                    println!("model {} promoted to production (F1 {:.4})", version, f1_score);
                }
                GateDecision::Rejected {
                    version,
                    f1_score,
                    threshold,
                } => {
                    println!(
                        "model {} rejected: F1 {:.4} below threshold {:.4}",
                        version, f1_score, threshold
                    );
                }
            }
        }
        Commands::Monitor => {
            let (data_cfg, feat_cfg, train_cfg) = load_configs(&cli.configs)?;
            let orchestrator = Orchestrator::new(layout, data_cfg, feat_cfg, train_cfg);
            let events = orchestrator.monitor()?;
            println!("{} alert(s) raised", events.len());
            for event in events {
                println!("[{:?}] {}: {}", event.severity, event.source, event.message);
            }
        }
        Commands::Predict { input, output } => {
            let service =
                ScoringService::load(&layout.registry_dir, layout.transform_path())?;
            let rows = service.predict_batch(&input, &output)?;
            println!("scored {} applications into {}", rows, output.display());
        }
        Commands::Score { application } => {
            let json = std::fs::read_to_string(&application)?;
            let app: LoanApplication = serde_json::from_str(&json)?;
            let service =
                ScoringService::load(&layout.registry_dir, layout.transform_path())?;
            let result = service.score(&app)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

/// Load the three config documents, falling back to defaults for any
/// that are absent.
fn load_configs(
    dir: &Path,
) -> anyhow::Result<(DataConfig, FeatureConfig, TrainingConfig)> {
    let data = match dir.join("data.yaml") {
        p if p.exists() => DataConfig::load(p)?,
        _ => DataConfig::default(),
    };
    let features = match dir.join("features.yaml") {
        p if p.exists() => FeatureConfig::load(p)?,
        _ => FeatureConfig::default(),
    };
    let training = match dir.join("training.yaml") {
        p if p.exists() => TrainingConfig::load(p)?,
        _ => TrainingConfig::default(),
    };
    Ok((data, features, training))
}

fn read_csv(path: &Path) -> anyhow::Result<DataFrame> {
    Ok(CsvReadOptions::default()
        .with_has_header(true)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?)
}
