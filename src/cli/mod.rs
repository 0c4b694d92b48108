// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`   — fits preprocessor + model, writes the artifact
//   2. `predict` — loads the artifact once and answers JSON
//                  requests, one JSON line out per request

pub mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use commands::{Commands, PredictArgs, TrainArgs};

use crate::application::train_use_case::TrainConfig;
use crate::domain::{error::PipelineError, request::ErrorResponse};
use crate::infra::artifact::ArtifactStore;
use std::{
    fs::File,
    io::{self, BufReader, Write},
};

/// The main CLI struct
#[derive(Parser, Debug)]
#[command(
    name = "tale-predict",
    version = "0.1.0",
    about = "Predict student pass/fail outcomes and explain every prediction per feature."
)]
pub struct Cli {
    /// The subcommand to run (train or predict)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)   => run_train(args),
            Commands::Predict(args) => run_predict(args),
        }
    }
}

fn run_train(args: TrainArgs) -> Result<()> {
    use crate::application::train_use_case::TrainUseCase;

    let config = train_config(args)?;
    tracing::info!("Starting training on tables in: {}", config.data_dir);

    let report = TrainUseCase::new(config).execute()?;

    let m = &report.metrics;
    println!("Model:     {}", m.model);
    println!("Students:  {} train / {} test", m.n_train, m.n_test);
    println!("Accuracy:  {:.4}", m.accuracy);
    println!("Precision: {:.4}", m.precision);
    println!("Recall:    {:.4}", m.recall);
    println!("F1:        {:.4}", m.f1);
    println!("\nMean |attribution| per feature:");
    for (name, value) in &report.importance {
        println!("  {name:<22} {value:.4}");
    }
    println!("\nArtifact saved to {}", report.artifact_path.display());
    Ok(())
}

/// Flags become a fresh TrainConfig unless --from-config replays a saved one.
fn train_config(mut args: TrainArgs) -> Result<TrainConfig> {
    match args.from_config.take() {
        Some(dir) => {
            let cfg = ArtifactStore::new(&dir).load_config()?;
            tracing::info!("Replaying training config saved in '{}'", dir);
            Ok(cfg)
        }
        None => Ok(args.into()),
    }
}

/// Artifact problems abort here; request problems become error responses.
fn run_predict(args: PredictArgs) -> Result<()> {
    use crate::application::predict_use_case::{respond, serve_lines, ServingContext};

    let ctx = ServingContext::load(&args.artifact_dir)
        .with_context(|| format!("Cannot start serving from '{}'", args.artifact_dir))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();

    if let Some(request) = args.request {
        let line = match serde_json::from_str(&request) {
            Ok(body) => respond(&ctx, &body)?,
            Err(e) => {
                let err = PipelineError::MalformedInput(e.to_string());
                serde_json::to_string(&ErrorResponse::from(&err))?
            }
        };
        writeln!(out, "{line}")?;
        return Ok(());
    }

    let summary = match args.input {
        Some(path) if path.as_os_str() != "-" => {
            let file = File::open(&path)
                .with_context(|| format!("Cannot open request file '{}'", path.display()))?;
            serve_lines(&ctx, BufReader::new(file), &mut out)?
        }
        _ => serve_lines(&ctx, io::stdin().lock(), &mut out)?,
    };

    tracing::info!("Served {} request(s), {} rejected", summary.served, summary.failed);
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::predictor::ModelKind;

    #[test]
    fn test_train_args_map_to_config() {
        let cli = Cli::try_parse_from([
            "tale-predict", "train", "--model", "rf", "--seed", "7", "--n-trees", "25",
            "--clickstream-file", "vle.csv",
        ])
        .unwrap();

        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg: TrainConfig = args.into();
        assert_eq!(cfg.model, ModelKind::RandomForest);
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.params.forest.n_trees, 25);
        assert_eq!(cfg.params.forest.seed, 7);
        assert_eq!(cfg.explainer.seed, 7);
        assert_eq!(cfg.paths.clickstream, "vle.csv");
        assert_eq!(cfg.paths.student_info, "studentInfo.csv");
    }

    #[test]
    fn test_from_config_replays_saved_run() {
        let dir = tempfile::tempdir().unwrap();
        let saved = TrainConfig {
            model: ModelKind::NeuralNet,
            seed:  99,
            ..TrainConfig::default()
        };
        ArtifactStore::new(dir.path()).save_config(&saved).unwrap();

        let saved_dir = dir.path().display().to_string();
        let cli = Cli::try_parse_from([
            "tale-predict", "train", "--from-config", saved_dir.as_str(), "--seed", "1",
        ])
        .unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        let cfg = train_config(args).unwrap();
        assert_eq!(cfg.model, ModelKind::NeuralNet);
        assert_eq!(cfg.seed, 99);

        let missing = dir.path().join("nope").display().to_string();
        let cli = Cli::try_parse_from(["tale-predict", "train", "--from-config", missing.as_str()]).unwrap();
        let Commands::Train(args) = cli.command else { panic!("expected train") };
        assert!(train_config(args).is_err());
    }

    #[test]
    fn test_predict_needs_exactly_one_source() {
        assert!(Cli::try_parse_from(["tale-predict", "predict"]).is_err());
        assert!(Cli::try_parse_from([
            "tale-predict", "predict", "--request", "{}", "--input", "r.jsonl",
        ])
        .is_err());
        assert!(Cli::try_parse_from(["tale-predict", "predict", "--input", "-"]).is_ok());
    }
}
