//! Medical reward calculation and the deterministic threshold sweep.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::metrics::{roc_auc, ConfusionMatrix, Metrics, MetricsReport};
use crate::domain::{Domain, RewardWeights, ThresholdRange};
use crate::error::{RewardError, RewardResult};

/// Reward reported when inputs cannot be scored.
pub const FAILURE_REWARD: f64 = -1.0;

/// Best threshold found by a sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub threshold: f64,
    pub reward: f64,
    pub metrics: MetricsReport,
}

/// Computes domain-weighted rewards for binary classification outcomes.
///
/// Owns one [`RewardWeights`] profile per domain. Scoring never panics and
/// never returns an error to the caller: malformed input yields
/// [`FAILURE_REWARD`] paired with [`MetricsReport::Failed`].
#[derive(Debug, Clone)]
pub struct RewardCalculator {
    profiles: HashMap<Domain, RewardWeights>,
}

impl RewardCalculator {
    /// Create a calculator with the static profile of every domain.
    pub fn new() -> Self {
        let profiles = Domain::ALL
            .iter()
            .map(|domain| (*domain, domain.default_weights()))
            .collect();
        Self { profiles }
    }

    /// Stored weights for a domain.
    pub fn weights(&self, domain: Domain) -> RewardWeights {
        self.profiles
            .get(&domain)
            .copied()
            .unwrap_or_else(|| domain.default_weights())
    }

    /// Persist a new weight profile for a domain.
    pub fn set_weights(&mut self, domain: Domain, weights: RewardWeights) {
        self.profiles.insert(domain, weights);
    }

    /// Score predictions with an explicit weight profile.
    ///
    /// This is the fallible core. Degenerate batches are not errors: precision,
    /// recall and F1 fall back to zero and an undefined AUC is left out of the
    /// base reward.
    pub fn score(
        weights: &RewardWeights,
        y_true: &[u8],
        y_pred: &[u8],
        y_pred_proba: Option<&[f64]>,
        domain: Domain,
    ) -> RewardResult<(f64, Metrics)> {
        validate(y_true, y_pred, y_pred_proba)?;

        let confusion = ConfusionMatrix::from_labels(y_true, y_pred);
        let accuracy = confusion.accuracy();
        let precision = confusion.precision();
        let recall = confusion.recall();
        let f1 = confusion.f1();

        let mut base_reward = weights.accuracy * accuracy
            + weights.precision * precision
            + weights.recall * recall
            + weights.f1 * f1;

        let auc = y_pred_proba.and_then(|proba| {
            let auc = roc_auc(y_true, proba);
            if auc.is_none() {
                debug!(domain = %domain, "ROC AUC undefined for single-class batch, omitting");
            }
            auc
        });
        if let Some(auc) = auc {
            base_reward += weights.auc * auc;
        }

        // Penalties scale with the misclassified fraction so the reward does
        // not depend on batch size.
        let total = confusion.total() as f64;
        let mut medical_penalty = 0.0;
        if confusion.false_negatives > 0 {
            medical_penalty += weights.false_negative_penalty * (confusion.false_negatives as f64 / total);
        }
        if confusion.false_positives > 0 {
            medical_penalty += weights.false_positive_penalty * (confusion.false_positives as f64 / total);
        }

        let total_reward = base_reward + medical_penalty;

        debug!(
            domain = %domain,
            total_reward = total_reward,
            base_reward = base_reward,
            medical_penalty = medical_penalty,
            "Medical reward calculated"
        );

        Ok((
            total_reward,
            Metrics {
                confusion,
                accuracy,
                precision,
                recall,
                f1,
                auc,
                base_reward,
                medical_penalty,
                total_reward,
                domain,
                threshold: None,
            },
        ))
    }

    /// Score with explicit weights, converting failures to the sentinel.
    pub fn score_with_weights(
        &self,
        weights: &RewardWeights,
        y_true: &[u8],
        y_pred: &[u8],
        y_pred_proba: Option<&[f64]>,
        domain: Domain,
    ) -> (f64, MetricsReport) {
        match Self::score(weights, y_true, y_pred, y_pred_proba, domain) {
            Ok((reward, metrics)) => (reward, MetricsReport::Scored(metrics)),
            Err(e) => {
                warn!(domain = %domain, error = %e, "Could not calculate medical reward");
                (
                    FAILURE_REWARD,
                    MetricsReport::Failed {
                        error: e.to_string(),
                        domain,
                    },
                )
            }
        }
    }

    /// Score predictions with the domain's stored weights.
    pub fn calculate_medical_reward(
        &self,
        y_true: &[u8],
        y_pred: &[u8],
        y_pred_proba: Option<&[f64]>,
        domain: Domain,
    ) -> (f64, MetricsReport) {
        let weights = self.weights(domain);
        self.score_with_weights(&weights, y_true, y_pred, y_pred_proba, domain)
    }

    /// Reward for classifying `y_pred_proba` at a fixed threshold.
    pub fn calculate_threshold_reward(
        &self,
        y_true: &[u8],
        y_pred_proba: &[f64],
        threshold: f64,
        domain: Domain,
    ) -> (f64, MetricsReport) {
        let weights = self.weights(domain);
        self.threshold_reward_with(&weights, y_true, y_pred_proba, threshold, domain)
    }

    fn threshold_reward_with(
        &self,
        weights: &RewardWeights,
        y_true: &[u8],
        y_pred_proba: &[f64],
        threshold: f64,
        domain: Domain,
    ) -> (f64, MetricsReport) {
        let y_pred = apply_threshold(y_pred_proba, threshold);
        match self.score_with_weights(weights, y_true, &y_pred, Some(y_pred_proba), domain) {
            (reward, MetricsReport::Scored(metrics)) => {
                (reward, MetricsReport::Scored(metrics.with_threshold(threshold)))
            }
            failed => failed,
        }
    }

    /// Sweep the domain's threshold range for the highest reward.
    ///
    /// Scans in ascending order and keeps the first threshold reaching the
    /// maximum, so ties resolve to the lowest threshold.
    pub fn find_optimal_threshold(
        &self,
        y_true: &[u8],
        y_pred_proba: &[f64],
        domain: Domain,
    ) -> ThresholdResult {
        self.find_optimal_threshold_in(domain.threshold_range(), y_true, y_pred_proba, domain)
    }

    /// Sweep an explicit threshold range.
    pub fn find_optimal_threshold_in(
        &self,
        range: ThresholdRange,
        y_true: &[u8],
        y_pred_proba: &[f64],
        domain: Domain,
    ) -> ThresholdResult {
        let weights = self.weights(domain);
        let mut best: Option<ThresholdResult> = None;

        for threshold in range.thresholds() {
            let (reward, metrics) =
                self.threshold_reward_with(&weights, y_true, y_pred_proba, threshold, domain);
            if best.as_ref().map_or(true, |b| reward > b.reward) {
                best = Some(ThresholdResult {
                    threshold,
                    reward,
                    metrics,
                });
            }
        }

        let result = best.unwrap_or_else(|| ThresholdResult {
            threshold: 0.5,
            reward: f64::NEG_INFINITY,
            metrics: MetricsReport::Failed {
                error: "threshold range is empty".to_string(),
                domain,
            },
        });

        info!(
            domain = %domain,
            threshold = result.threshold,
            reward = result.reward,
            "Optimal threshold found"
        );

        result
    }
}

impl Default for RewardCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Binary predictions: positive when `probability >= threshold`.
pub fn apply_threshold(y_pred_proba: &[f64], threshold: f64) -> Vec<u8> {
    y_pred_proba
        .iter()
        .map(|&p| u8::from(p >= threshold))
        .collect()
}

fn validate(y_true: &[u8], y_pred: &[u8], y_pred_proba: Option<&[f64]>) -> RewardResult<()> {
    if y_true.is_empty() {
        return Err(RewardError::EmptyInput);
    }
    if y_pred.len() != y_true.len() {
        return Err(RewardError::LengthMismatch {
            field: "y_pred",
            expected: y_true.len(),
            actual: y_pred.len(),
        });
    }
    if let Some((index, &value)) = y_true
        .iter()
        .chain(y_pred)
        .enumerate()
        .find(|&(_, &v)| v > 1)
    {
        return Err(RewardError::InvalidLabel {
            index: index % y_true.len(),
            value,
        });
    }
    if let Some(proba) = y_pred_proba {
        if proba.len() != y_true.len() {
            return Err(RewardError::LengthMismatch {
                field: "y_pred_proba",
                expected: y_true.len(),
                actual: proba.len(),
            });
        }
        if let Some(index) = proba.iter().position(|p| !p.is_finite()) {
            return Err(RewardError::NonFiniteProbability { index });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scored(report: &MetricsReport) -> &Metrics {
        report.metrics().expect("expected scored metrics")
    }

    #[test]
    fn test_perfect_predictions_reward_sums_weights() {
        let calculator = RewardCalculator::new();
        let (reward, report) = calculator.calculate_medical_reward(
            &[0, 1, 0, 1],
            &[0, 1, 0, 1],
            Some(&[0.1, 0.9, 0.2, 0.8]),
            Domain::Kidney,
        );
        assert!((reward - 1.0).abs() < 1e-12);
        let metrics = scored(&report);
        assert_eq!(metrics.medical_penalty, 0.0);
        assert_eq!(metrics.auc, Some(1.0));
    }

    #[test]
    fn test_penalty_uses_fractions() {
        let calculator = RewardCalculator::new();
        // One FN and one FP out of four
        let (_, report) =
            calculator.calculate_medical_reward(&[1, 1, 0, 0], &[1, 0, 1, 0], None, Domain::Dengue);
        let metrics = scored(&report);
        let expected = -2.0 * 0.25 + -0.5 * 0.25;
        assert!((metrics.medical_penalty - expected).abs() < 1e-12);
        assert!((metrics.total_reward - (metrics.base_reward + expected)).abs() < 1e-12);
    }

    #[test]
    fn test_auc_omitted_for_single_class() {
        let calculator = RewardCalculator::new();
        let (reward, report) =
            calculator.calculate_medical_reward(&[1, 1], &[1, 1], Some(&[0.7, 0.9]), Domain::Dengue);
        let metrics = scored(&report);
        assert!(metrics.auc.is_none());
        // accuracy + precision + recall + f1 weights only
        assert!((reward - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_malformed_input_returns_sentinel() {
        let calculator = RewardCalculator::new();
        let (reward, report) =
            calculator.calculate_medical_reward(&[0, 1, 1], &[0, 1], None, Domain::Dengue);
        assert_eq!(reward, FAILURE_REWARD);
        assert!(report.is_error());
        assert_eq!(report.domain(), Domain::Dengue);

        let (reward, report) = calculator.calculate_medical_reward(&[], &[], None, Domain::Kidney);
        assert_eq!(reward, FAILURE_REWARD);
        assert_eq!(report.error(), Some("no samples to score"));
    }

    #[test]
    fn test_non_binary_label_rejected() {
        let result = RewardCalculator::score(
            &Domain::Dengue.default_weights(),
            &[0, 2],
            &[0, 1],
            None,
            Domain::Dengue,
        );
        assert_eq!(result.unwrap_err(), RewardError::InvalidLabel { index: 1, value: 2 });
    }

    #[test]
    fn test_non_finite_probability_rejected() {
        let result = RewardCalculator::score(
            &Domain::Dengue.default_weights(),
            &[0, 1],
            &[0, 1],
            Some(&[0.2, f64::NAN]),
            Domain::Dengue,
        );
        assert_eq!(result.unwrap_err(), RewardError::NonFiniteProbability { index: 1 });
    }

    #[test]
    fn test_threshold_reward_stamps_threshold() {
        let calculator = RewardCalculator::new();
        let (_, report) =
            calculator.calculate_threshold_reward(&[0, 1], &[0.4, 0.6], 0.5, Domain::Dengue);
        assert_eq!(scored(&report).threshold, Some(0.5));
    }

    #[test]
    fn test_apply_threshold_is_inclusive() {
        assert_eq!(apply_threshold(&[0.49, 0.5, 0.51], 0.5), vec![0, 1, 1]);
    }

    #[test]
    fn test_empty_range_sweep() {
        let calculator = RewardCalculator::new();
        let result = calculator.find_optimal_threshold_in(
            ThresholdRange::new(0.5, 0.5, 0.1),
            &[0, 1],
            &[0.2, 0.8],
            Domain::Dengue,
        );
        assert_eq!(result.threshold, 0.5);
        assert!(result.metrics.is_error());
    }

    #[test]
    fn test_set_weights_persists() {
        let mut calculator = RewardCalculator::new();
        let weights = RewardWeights {
            recall: 0.5,
            ..Domain::Dengue.default_weights()
        };
        calculator.set_weights(Domain::Dengue, weights);
        assert_eq!(calculator.weights(Domain::Dengue), weights);
        assert_eq!(calculator.weights(Domain::Kidney), Domain::Kidney.default_weights());
    }
}
