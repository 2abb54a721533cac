//! Adaptive reward weighting driven by per-domain performance history.
//!
//! Every adaptive evaluation is recorded into a bounded [`PerformanceHistory`].
//! Once enough history exists, the weights handed to the scorer are nudged:
//!
//! - **Poor recent performance** (mean of the last 10 rewards below the
//!   threshold): recall ×1.2, precision ×0.9.
//! - **Stagnation** (no new best for more than the stagnation limit):
//!   accuracy ×0.9, F1 ×1.1.
//!
//! Metric weights are renormalised to sum to 1.0 afterwards; penalties are
//! never touched. Adapted weights are passed by value into the scorer, so the
//! calculator's stored profile is never modified.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::AdaptiveConfig;
use crate::domain::{Domain, RewardWeights};
use crate::reward::{MetricsReport, RewardCalculator};

/// Rewards averaged when judging recent performance.
const RECENT_WINDOW: usize = 10;

/// Rolling record of rewards observed for one domain.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceHistory {
    rewards: Vec<f64>,
    metrics: Vec<MetricsReport>,
    best_reward: f64,
    stagnation_count: u32,
}

impl Default for PerformanceHistory {
    fn default() -> Self {
        Self {
            rewards: Vec::new(),
            metrics: Vec::new(),
            best_reward: f64::NEG_INFINITY,
            stagnation_count: 0,
        }
    }
}

impl PerformanceHistory {
    /// Record a reward, trimming to the most recent `retain` entries once
    /// `capacity` is exceeded.
    fn record(&mut self, reward: f64, metrics: MetricsReport, capacity: usize, retain: usize) {
        self.rewards.push(reward);
        self.metrics.push(metrics);

        if reward > self.best_reward {
            self.best_reward = reward;
            self.stagnation_count = 0;
        } else {
            self.stagnation_count += 1;
        }

        if self.rewards.len() > capacity {
            let drop = self.rewards.len() - retain;
            self.rewards.drain(..drop);
            self.metrics.drain(..drop);
        }
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    pub fn metrics(&self) -> &[MetricsReport] {
        &self.metrics
    }

    /// Highest reward seen since the history was created.
    pub fn best_reward(&self) -> f64 {
        self.best_reward
    }

    /// Evaluations since the last new best.
    pub fn stagnation_count(&self) -> u32 {
        self.stagnation_count
    }

    /// Mean of the most recent `window` rewards.
    pub fn recent_mean(&self, window: usize) -> Option<f64> {
        if self.rewards.is_empty() || window == 0 {
            return None;
        }
        let recent = &self.rewards[self.rewards.len().saturating_sub(window)..];
        Some(recent.iter().sum::<f64>() / recent.len() as f64)
    }
}

/// Which adaptation rule produced a weight set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Adaptation {
    /// Not enough history; static weights returned
    Insufficient,
    /// Recent rewards are poor; recall favoured
    PoorPerformance,
    /// Rewards have plateaued; F1 favoured over accuracy
    Stagnation,
    /// History is healthy; weights renormalised only
    Stable,
}

/// Reward system that retunes weights from observed performance.
#[derive(Debug, Clone)]
pub struct AdaptiveRewardSystem {
    calculator: RewardCalculator,
    histories: HashMap<Domain, PerformanceHistory>,
    config: AdaptiveConfig,
}

impl AdaptiveRewardSystem {
    /// Create a system with default tuning and default domain profiles.
    pub fn new() -> Self {
        Self::with_config(RewardCalculator::new(), AdaptiveConfig::default())
    }

    pub fn with_config(calculator: RewardCalculator, config: AdaptiveConfig) -> Self {
        Self {
            calculator,
            histories: HashMap::new(),
            config,
        }
    }

    /// The calculator holding the static domain profiles.
    pub fn calculator(&self) -> &RewardCalculator {
        &self.calculator
    }

    /// Mutable access for explicitly persisting new profiles.
    pub fn calculator_mut(&mut self) -> &mut RewardCalculator {
        &mut self.calculator
    }

    pub fn history(&self, domain: Domain) -> Option<&PerformanceHistory> {
        self.histories.get(&domain)
    }

    /// Record an evaluation outcome for a domain.
    pub fn update_performance(&mut self, domain: Domain, reward: f64, metrics: MetricsReport) {
        let history = self.histories.entry(domain).or_default();
        history.record(
            reward,
            metrics,
            self.config.history_capacity,
            self.config.history_retain,
        );
        debug!(
            domain = %domain,
            reward = reward,
            best_reward = history.best_reward,
            stagnation = history.stagnation_count,
            "Performance history updated"
        );
    }

    /// Weights adapted to the domain's recent history.
    pub fn get_adaptive_weights(&self, domain: Domain) -> RewardWeights {
        self.adapt(domain).0
    }

    /// Adapted weights along with the rule that produced them.
    pub fn adapt(&self, domain: Domain) -> (RewardWeights, Adaptation) {
        let base = self.calculator.weights(domain);

        let history = match self.histories.get(&domain) {
            Some(h) if h.len() >= self.config.min_history => h,
            _ => return (base, Adaptation::Insufficient),
        };

        let recent_mean = history.recent_mean(RECENT_WINDOW).unwrap_or(0.0);
        let mut weights = base;
        let adaptation = if recent_mean < self.config.poor_reward_threshold {
            weights.recall *= 1.2;
            weights.precision *= 0.9;
            Adaptation::PoorPerformance
        } else if history.stagnation_count > self.config.stagnation_limit {
            weights.accuracy *= 0.9;
            weights.f1 *= 1.1;
            Adaptation::Stagnation
        } else {
            Adaptation::Stable
        };
        let weights = weights.normalized();

        info!(
            domain = %domain,
            adaptation = ?adaptation,
            recent_mean = recent_mean,
            recall = weights.recall,
            precision = weights.precision,
            accuracy = weights.accuracy,
            f1 = weights.f1,
            "Adaptive weights computed"
        );

        (weights, adaptation)
    }

    /// Score with adapted weights and record the result.
    ///
    /// The adapted weights only flow into this call; the calculator's stored
    /// profile is left as it was, whether or not scoring succeeds.
    pub fn calculate_adaptive_reward(
        &mut self,
        y_true: &[u8],
        y_pred: &[u8],
        y_pred_proba: Option<&[f64]>,
        domain: Domain,
    ) -> (f64, MetricsReport) {
        let weights = self.get_adaptive_weights(domain);
        let (reward, metrics) =
            self.calculator
                .score_with_weights(&weights, y_true, y_pred, y_pred_proba, domain);
        self.update_performance(domain, reward, metrics.clone());
        (reward, metrics)
    }
}

impl Default for AdaptiveRewardSystem {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(domain: Domain) -> MetricsReport {
        MetricsReport::Failed {
            error: "test".to_string(),
            domain,
        }
    }

    #[test]
    fn test_stagnation_counter_resets_on_improvement() {
        let mut system = AdaptiveRewardSystem::new();
        for reward in [0.5, 0.4, 0.3] {
            system.update_performance(Domain::Dengue, reward, failed(Domain::Dengue));
        }
        let history = system.history(Domain::Dengue).unwrap();
        assert_eq!(history.stagnation_count(), 2);
        assert_eq!(history.best_reward(), 0.5);

        system.update_performance(Domain::Dengue, 0.9, failed(Domain::Dengue));
        let history = system.history(Domain::Dengue).unwrap();
        assert_eq!(history.stagnation_count(), 0);
        assert_eq!(history.best_reward(), 0.9);
    }

    #[test]
    fn test_equal_reward_counts_as_stagnation() {
        let mut system = AdaptiveRewardSystem::new();
        system.update_performance(Domain::Kidney, 0.7, failed(Domain::Kidney));
        system.update_performance(Domain::Kidney, 0.7, failed(Domain::Kidney));
        assert_eq!(system.history(Domain::Kidney).unwrap().stagnation_count(), 1);
    }

    #[test]
    fn test_history_trimmed_on_overflow() {
        let mut system = AdaptiveRewardSystem::new();
        for i in 0..101 {
            system.update_performance(Domain::Dengue, i as f64, failed(Domain::Dengue));
        }
        let history = system.history(Domain::Dengue).unwrap();
        assert_eq!(history.len(), 50);
        assert_eq!(history.metrics().len(), 50);
        assert_eq!(history.rewards()[0], 51.0);
        assert_eq!(history.rewards()[49], 100.0);
        assert_eq!(history.best_reward(), 100.0);
    }

    #[test]
    fn test_insufficient_history_returns_static_weights() {
        let mut system = AdaptiveRewardSystem::new();
        for _ in 0..9 {
            system.update_performance(Domain::Dengue, 0.1, failed(Domain::Dengue));
        }
        let (weights, adaptation) = system.adapt(Domain::Dengue);
        assert_eq!(adaptation, Adaptation::Insufficient);
        assert_eq!(weights, Domain::Dengue.default_weights());
    }

    #[test]
    fn test_poor_performance_favours_recall() {
        let mut system = AdaptiveRewardSystem::new();
        for _ in 0..10 {
            system.update_performance(Domain::Dengue, 0.2, failed(Domain::Dengue));
        }
        let base = Domain::Dengue.default_weights();
        let (weights, adaptation) = system.adapt(Domain::Dengue);
        assert_eq!(adaptation, Adaptation::PoorPerformance);
        assert!(weights.recall > base.recall);
        assert!(weights.precision < base.precision);
        assert!((weights.metric_sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_stagnation_favours_f1() {
        let mut system = AdaptiveRewardSystem::new();
        system.update_performance(Domain::MentalHealth, 0.9, failed(Domain::MentalHealth));
        for _ in 0..9 {
            system.update_performance(Domain::MentalHealth, 0.8, failed(Domain::MentalHealth));
        }
        let base = Domain::MentalHealth.default_weights();
        let (weights, adaptation) = system.adapt(Domain::MentalHealth);
        assert_eq!(adaptation, Adaptation::Stagnation);
        assert!(weights.f1 > base.f1);
        assert!(weights.accuracy < base.accuracy);
    }

    #[test]
    fn test_recent_mean_uses_window() {
        let mut history = PerformanceHistory::default();
        for reward in [10.0, 1.0, 2.0, 3.0] {
            history.record(reward, failed(Domain::Dengue), 100, 50);
        }
        assert_eq!(history.recent_mean(3), Some(2.0));
        assert_eq!(history.recent_mean(10), Some(4.0));
        assert_eq!(PerformanceHistory::default().recent_mean(3), None);
    }
}
