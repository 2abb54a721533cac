//! Command-line surface over the threshold optimizer.
//!
//! Every command reads a JSON input file and prints a JSON report.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::Config;
use crate::domain::Domain;
use crate::error::AppResult;
use crate::optimizer::ThresholdOptimizer;
use crate::registry::{
    IdentityScaler, LogisticScorer, ModelRegistry, Scaler, Scorer, SoftmaxScorer, StandardScaler,
};
use crate::reward::PredictionRecord;
use crate::rl::{LabeledDataset, TrainingReport};

/// Clinical decision-threshold optimization.
#[derive(Parser, Debug)]
#[command(name = "threshold-rl", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Sweep the domain's threshold range for the best reward
    Sweep {
        /// dengue, kidney or mental_health
        #[arg(long)]
        domain: Domain,

        /// JSON file with `labels` and `probabilities`
        #[arg(long)]
        input: PathBuf,
    },

    /// Score a batch of serving-layer prediction results
    EvaluateBatch {
        /// Domain name; unknown names fall back to the default profile
        #[arg(long)]
        domain: String,

        /// JSON file with a `results` array
        #[arg(long)]
        input: PathBuf,
    },

    /// Train an RL threshold agent
    Train {
        #[arg(long)]
        domain: Domain,

        /// JSON file with features, labels, scorer and scaler
        #[arg(long)]
        input: PathBuf,

        /// Override the configured episode count
        #[arg(long)]
        episodes: Option<usize>,

        /// Seed for a reproducible run
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Compare the default decision rule with the swept optimum
    EvaluateModel {
        #[arg(long)]
        domain: Domain,

        /// Same input format as `train`
        #[arg(long)]
        input: PathBuf,
    },
}

/// Input for `sweep`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepInput {
    pub labels: Vec<u8>,
    pub probabilities: Vec<f64>,
}

/// Input for `evaluate-batch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchInput {
    pub results: Vec<PredictionRecord>,
}

/// Scorer definition embedded in a training input.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScorerSpec {
    Logistic(LogisticScorer),
    Softmax(SoftmaxScorer),
}

impl ScorerSpec {
    fn build(self) -> AppResult<Arc<dyn Scorer>> {
        let scorer: Arc<dyn Scorer> = match self {
            ScorerSpec::Logistic(s) => Arc::new(LogisticScorer::new(s.weights, s.bias)?),
            ScorerSpec::Softmax(s) => Arc::new(SoftmaxScorer::new(s.weights, s.biases)?),
        };
        Ok(scorer)
    }
}

/// Input for `train` and `evaluate-model`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingInput {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    pub scorer: ScorerSpec,
    /// Standard-scaler parameters; features are used as-is when omitted
    #[serde(default)]
    pub scaler: Option<StandardScaler>,
}

impl TrainingInput {
    /// Registry holding this input's collaborators for `domain`.
    pub fn registry(&self, domain: Domain) -> AppResult<ModelRegistry> {
        let scorer = self.scorer.clone().build()?;
        let scaler: Arc<dyn Scaler> = match &self.scaler {
            Some(s) => Arc::new(StandardScaler::new(s.mean.clone(), s.scale.clone())?),
            None => Arc::new(IdentityScaler),
        };
        let mut registry = ModelRegistry::new();
        registry.register(domain, scorer, scaler);
        Ok(registry)
    }

    pub fn dataset(&self) -> AppResult<LabeledDataset> {
        Ok(LabeledDataset::from_rows(&self.features, self.labels.clone())?)
    }
}

/// Report printed by `train`.
#[derive(Debug, Clone, Serialize)]
pub struct TrainOutput {
    pub report: TrainingReport,
    /// Greedy threshold for the first sample
    pub recommended_threshold: f64,
}

/// Result of CLI command execution.
#[derive(Debug)]
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a CLI command.
pub fn execute_command(command: Commands, config: &Config) -> CliResult {
    let result = match command {
        Commands::Sweep { domain, input } => execute_sweep(config, domain, &input),
        Commands::EvaluateBatch { domain, input } => {
            execute_evaluate_batch(config, Domain::resolve(&domain), &input)
        }
        Commands::Train {
            domain,
            input,
            episodes,
            seed,
        } => execute_train(config, domain, &input, episodes, seed),
        Commands::EvaluateModel { domain, input } => {
            execute_evaluate_model(config, domain, &input)
        }
    };

    match result {
        Ok(output) => CliResult::success(output),
        Err(e) => CliResult::error(format!("Error: {}", e)),
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<T> {
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn to_json<T: Serialize>(value: &T) -> AppResult<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

fn optimizer(config: &Config) -> ThresholdOptimizer {
    ThresholdOptimizer::new(config.rl.clone(), config.adaptive.clone())
}

fn execute_sweep(config: &Config, domain: Domain, input: &Path) -> AppResult<String> {
    let input: SweepInput = read_json(input)?;
    let result = optimizer(config).find_optimal_threshold(&input.labels, &input.probabilities, domain);
    to_json(&result)
}

fn execute_evaluate_batch(config: &Config, domain: Domain, input: &Path) -> AppResult<String> {
    let input: BatchInput = read_json(input)?;
    let report = optimizer(config).calculate_batch_rewards(&input.results, domain);
    to_json(&report)
}

fn execute_train(
    config: &Config,
    domain: Domain,
    input: &Path,
    episodes: Option<usize>,
    seed: Option<u64>,
) -> AppResult<String> {
    let input: TrainingInput = read_json(input)?;
    let registry = input.registry(domain)?;
    let dataset = input.dataset()?;
    let first_row = dataset.row(0);

    let mut rl_config = config.rl.clone();
    if let Some(episodes) = episodes {
        rl_config.episodes = episodes;
    }
    if seed.is_some() {
        rl_config.seed = seed;
    }
    rl_config.validate()?;

    let optimizer = ThresholdOptimizer::new(rl_config, config.adaptive.clone());
    let outcome = optimizer.train_rl_agent(&registry, dataset, domain)?;

    let state = registry.scaler(domain)?.transform(&first_row)?;
    let recommended_threshold = outcome.agent.greedy_threshold(&state);

    info!(
        run_id = %outcome.report.run_id,
        recommended_threshold = recommended_threshold,
        "Training command finished"
    );

    to_json(&TrainOutput {
        report: outcome.report,
        recommended_threshold,
    })
}

fn execute_evaluate_model(config: &Config, domain: Domain, input: &Path) -> AppResult<String> {
    let input: TrainingInput = read_json(input)?;
    let registry = input.registry(domain)?;
    let dataset = input.dataset()?;
    let evaluation = optimizer(config).evaluate_model_performance(&registry, &dataset, domain)?;
    to_json(&evaluation)
}
