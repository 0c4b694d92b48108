// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `predict`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, enums)

use clap::{Args, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::data::loader::LoaderPaths;
use crate::ml::predictor::ModelKind;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train a classifier on the OULAD CSV tables and save the artifact
    Train(TrainArgs),

    /// Predict and explain outcomes for JSON requests using a saved artifact
    Predict(PredictArgs),
}

/// Model family selected with --model
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelArg {
    /// Random forest
    Rf,
    /// Gradient-boosted trees
    Gbm,
    /// Feed-forward neural network
    Nn,
}

impl From<ModelArg> for ModelKind {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Rf  => ModelKind::RandomForest,
            ModelArg::Gbm => ModelKind::GradientBoosting,
            ModelArg::Nn  => ModelKind::NeuralNet,
        }
    }
}

/// All arguments for the `train` command.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Directory containing the four CSV tables
    #[arg(long, default_value = "data")]
    pub data_dir: String,

    /// Directory to write artifact.json, train_config.json and metrics
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,

    /// Which classifier to train
    #[arg(long, value_enum, default_value_t = ModelArg::Gbm)]
    pub model: ModelArg,

    /// Fraction of students held out for evaluation
    #[arg(long, default_value_t = 0.2)]
    pub test_fraction: f64,

    /// Seed for the split, the model and the sampling explainer
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of trees (random forest) or boosting rounds (gradient boosting)
    #[arg(long)]
    pub n_trees: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Learning rate for gradient boosting or the network
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Hidden layer width of the network
    #[arg(long)]
    pub hidden: Option<usize>,

    /// Training epochs of the network
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Permutations per background row for the sampling explainer
    #[arg(long, default_value_t = 16)]
    pub n_permutations: usize,

    /// Training rows kept as the explainer's background set
    #[arg(long, default_value_t = 50)]
    pub max_background: usize,

    /// File name of the clickstream table inside --data-dir
    #[arg(long, default_value = "studentVle.csv")]
    pub clickstream_file: String,

    /// Re-run with the train_config.json saved in this directory
    /// (every other training flag is ignored)
    #[arg(long)]
    pub from_config: Option<String>,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// The application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        let mut cfg = TrainConfig {
            data_dir:      a.data_dir,
            artifact_dir:  a.artifact_dir,
            paths:         LoaderPaths { clickstream: a.clickstream_file, ..LoaderPaths::default() },
            model:         a.model.into(),
            test_fraction: a.test_fraction,
            seed:          a.seed,
            ..TrainConfig::default()
        };

        let p = &mut cfg.params;
        p.forest.seed   = a.seed;
        p.boosting.seed = a.seed;
        p.network.seed  = a.seed;
        if let Some(n) = a.n_trees {
            p.forest.n_trees       = n;
            p.boosting.n_estimators = n;
        }
        if let Some(d) = a.max_depth {
            p.forest.max_depth   = d;
            p.boosting.max_depth = d;
        }
        if let Some(lr) = a.learning_rate {
            p.boosting.learning_rate = lr;
            p.network.learning_rate  = lr;
        }
        if let Some(h) = a.hidden {
            p.network.hidden = h;
        }
        if let Some(e) = a.epochs {
            p.network.epochs = e;
        }

        cfg.explainer.seed           = a.seed;
        cfg.explainer.n_permutations = a.n_permutations;
        cfg.explainer.max_background = a.max_background;
        cfg
    }
}

/// All arguments for the `predict` command
#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Directory where `train` saved the artifact
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: String,

    /// A single request as a JSON object
    #[arg(long, conflicts_with = "input", required_unless_present = "input")]
    pub request: Option<String>,

    /// Newline-delimited JSON requests ("-" reads stdin)
    #[arg(long)]
    pub input: Option<PathBuf>,
}
