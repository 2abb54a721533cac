//! Entry points used by the serving layer.
//!
//! [`ThresholdOptimizer`] owns the adaptive reward system and exposes the
//! deterministic sweep, reward scoring, batch evaluation, RL training and
//! the RL threshold recommendation. Collaborators come from a
//! [`ModelRegistry`] passed in by the caller.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use tracing::{info, warn};

use crate::adaptive::AdaptiveRewardSystem;
use crate::config::{AdaptiveConfig, RlConfig};
use crate::domain::Domain;
use crate::error::{AppError, AppResult};
use crate::registry::ModelRegistry;
use crate::reward::{
    BatchReport, MetricsReport, PredictionRecord, RewardCalculator, ThresholdResult,
};
use crate::rl::{self, Agent, LabeledDataset, PredictionEnvironment, TrainedAgent, TrainingOutcome};

/// Threshold returned when no trained agent is available.
pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Model quality at the default decision rule compared with the swept optimum.
#[derive(Debug, Clone, Serialize)]
pub struct ModelEvaluation {
    pub domain: Domain,
    pub performance_reward: f64,
    pub performance_metrics: MetricsReport,
    pub optimal_threshold: f64,
    pub optimal_reward: f64,
    pub optimal_metrics: MetricsReport,
    pub improvement: f64,
    pub timestamp: DateTime<Utc>,
}

/// Orchestrates reward scoring, threshold search and RL training.
#[derive(Debug, Clone)]
pub struct ThresholdOptimizer {
    adaptive: AdaptiveRewardSystem,
    rl_config: RlConfig,
}

impl ThresholdOptimizer {
    pub fn new(rl_config: RlConfig, adaptive_config: AdaptiveConfig) -> Self {
        Self {
            adaptive: AdaptiveRewardSystem::with_config(RewardCalculator::new(), adaptive_config),
            rl_config,
        }
    }

    pub fn calculator(&self) -> &RewardCalculator {
        self.adaptive.calculator()
    }

    pub fn adaptive(&self) -> &AdaptiveRewardSystem {
        &self.adaptive
    }

    pub fn adaptive_mut(&mut self) -> &mut AdaptiveRewardSystem {
        &mut self.adaptive
    }

    pub fn rl_config(&self) -> &RlConfig {
        &self.rl_config
    }

    pub fn find_optimal_threshold(
        &self,
        y_true: &[u8],
        y_pred_proba: &[f64],
        domain: Domain,
    ) -> ThresholdResult {
        self.calculator()
            .find_optimal_threshold(y_true, y_pred_proba, domain)
    }

    pub fn calculate_medical_reward(
        &self,
        y_true: &[u8],
        y_pred: &[u8],
        y_pred_proba: Option<&[f64]>,
        domain: Domain,
    ) -> (f64, MetricsReport) {
        self.calculator()
            .calculate_medical_reward(y_true, y_pred, y_pred_proba, domain)
    }

    pub fn calculate_adaptive_reward(
        &mut self,
        y_true: &[u8],
        y_pred: &[u8],
        y_pred_proba: Option<&[f64]>,
        domain: Domain,
    ) -> (f64, MetricsReport) {
        self.adaptive
            .calculate_adaptive_reward(y_true, y_pred, y_pred_proba, domain)
    }

    pub fn calculate_batch_rewards(
        &self,
        records: &[PredictionRecord],
        domain: Domain,
    ) -> BatchReport {
        self.calculator().calculate_batch_rewards(records, domain)
    }

    /// Train an agent for `domain` on `dataset`.
    ///
    /// Fails with [`AppError::ResourceUnavailable`] if the registry has no
    /// scorer or scaler for the domain.
    pub fn train_rl_agent(
        &self,
        registry: &ModelRegistry,
        dataset: LabeledDataset,
        domain: Domain,
    ) -> AppResult<TrainingOutcome> {
        let scorer = registry.scorer(domain)?;
        let scaler = registry.scaler(domain)?;

        let state_size = dataset.n_features();
        let mut env = PredictionEnvironment::new(
            scorer,
            scaler,
            dataset,
            self.rl_config.action_space_size,
        );
        let agent = rl::select_agent(state_size, env.action_space_size(), &self.rl_config);
        Ok(rl::train(&mut env, agent, domain, &self.rl_config)?)
    }

    /// Score the dataset at the default decision rule, then sweep.
    pub fn evaluate_model_performance(
        &self,
        registry: &ModelRegistry,
        dataset: &LabeledDataset,
        domain: Domain,
    ) -> AppResult<ModelEvaluation> {
        let scorer = registry.scorer(domain)?;
        let scaler = registry.scaler(domain)?;

        let scaled_rows = (0..dataset.len())
            .map(|i| scaler.transform(&dataset.row(i)))
            .collect::<Result<Vec<Array1<f64>>, _>>()?;
        let views: Vec<_> = scaled_rows.iter().map(|r| r.view()).collect();
        let scaled = ndarray::stack(Axis(0), &views).map_err(|e| AppError::Internal {
            message: format!("could not assemble scaled features: {e}"),
        })?;
        let output: Array2<f64> = scorer.predict(&scaled)?;

        let mut y_pred = Vec::with_capacity(dataset.len());
        let mut y_proba = Vec::with_capacity(dataset.len());
        for row in output.rows() {
            let row = row.to_vec();
            let decision = rl::decide(&row, DEFAULT_THRESHOLD)?;
            y_pred.push(u8::from(decision.predicted_label == 1));
            y_proba.push(decision.probability);
        }

        let y_true = dataset.labels();
        if y_true.iter().any(|&label| label > 1) {
            warn!(domain = %domain, "Non-binary labels present; reward inputs will be rejected");
        }

        let (performance_reward, performance_metrics) =
            self.calculate_medical_reward(y_true, &y_pred, Some(&y_proba), domain);
        let optimal = self.find_optimal_threshold(y_true, &y_proba, domain);
        let improvement = optimal.reward - performance_reward;

        info!(
            domain = %domain,
            performance_reward = performance_reward,
            optimal_threshold = optimal.threshold,
            improvement = improvement,
            "Model performance evaluated"
        );

        Ok(ModelEvaluation {
            domain,
            performance_reward,
            performance_metrics,
            optimal_threshold: optimal.threshold,
            optimal_reward: optimal.reward,
            optimal_metrics: optimal.metrics,
            improvement,
            timestamp: Utc::now(),
        })
    }
}

impl Default for ThresholdOptimizer {
    fn default() -> Self {
        Self::new(RlConfig::default(), AdaptiveConfig::default())
    }
}

/// Threshold suggested by an agent for one scaled state.
///
/// Without an agent this is [`DEFAULT_THRESHOLD`]. With one, the agent's
/// ε-greedy action is decoded as `(a + 1) / K`, so it may still explore.
pub fn optimize_threshold_with_rl(agent: Option<&mut TrainedAgent>, state: &Array1<f64>) -> f64 {
    match agent {
        None => DEFAULT_THRESHOLD,
        Some(agent) => {
            let action = agent.act(state);
            rl::action_to_threshold(action, agent.action_space_size())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;

    #[test]
    fn test_no_agent_returns_default_threshold() {
        assert_eq!(optimize_threshold_with_rl(None, &arr1(&[0.1, 0.2])), 0.5);
    }

    #[test]
    fn test_greedy_agent_threshold_is_on_grid() {
        let config = RlConfig {
            epsilon: 0.0,
            epsilon_min: 0.0,
            seed: Some(1),
            ..Default::default()
        };
        let mut agent = rl::select_agent(2, 10, &config);
        let threshold = optimize_threshold_with_rl(Some(&mut agent), &arr1(&[0.1, 0.2]));
        // Fresh Q-row of zeros picks action 0
        assert!((threshold - 0.1).abs() < 1e-12);
    }
}
