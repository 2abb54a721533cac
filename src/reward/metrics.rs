//! Classification metrics used by the reward calculator.

use serde::{Deserialize, Serialize};

use crate::domain::Domain;

/// Binary confusion matrix. The four counts always partition the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negatives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_positives: usize,
}

impl ConfusionMatrix {
    /// Tally a confusion matrix from binary labels.
    ///
    /// Labels must already be validated as 0 or 1.
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut matrix = Self::default();
        for (&actual, &predicted) in y_true.iter().zip(y_pred) {
            match (actual, predicted) {
                (0, 0) => matrix.true_negatives += 1,
                (0, _) => matrix.false_positives += 1,
                (_, 0) => matrix.false_negatives += 1,
                _ => matrix.true_positives += 1,
            }
        }
        matrix
    }

    pub fn total(&self) -> usize {
        self.true_negatives + self.false_positives + self.false_negatives + self.true_positives
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }

    /// Zero when nothing was predicted positive.
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// Zero when the batch has no positives.
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let precision = self.precision();
        let recall = self.recall();
        if precision + recall == 0.0 {
            0.0
        } else {
            2.0 * precision * recall / (precision + recall)
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// Area under the ROC curve via the rank-sum statistic.
///
/// Tied scores receive their average rank. Returns `None` when the batch
/// holds a single class, since AUC is undefined there.
pub fn roc_auc(y_true: &[u8], scores: &[f64]) -> Option<f64> {
    if y_true.len() != scores.len() {
        return None;
    }
    let positives = y_true.iter().filter(|&&label| label == 1).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && scores[order[end + 1]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1..=end+1 share their mean
        let average_rank = (start + end) as f64 / 2.0 + 1.0;
        for &idx in &order[start..=end] {
            if y_true[idx] == 1 {
                positive_rank_sum += average_rank;
            }
        }
        start = end + 1;
    }

    let positives = positives as f64;
    let negatives = negatives as f64;
    Some((positive_rank_sum - positives * (positives + 1.0) / 2.0) / (positives * negatives))
}

// ============================================================================
// Metrics
// ============================================================================

/// Outcome of one reward evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    #[serde(flatten)]
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Absent when AUC was not requested or is undefined for the batch
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auc: Option<f64>,
    pub base_reward: f64,
    pub medical_penalty: f64,
    pub total_reward: f64,
    pub domain: Domain,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

impl Metrics {
    /// Copy of these metrics tagged with the threshold that produced them.
    pub fn with_threshold(self, threshold: f64) -> Self {
        Self {
            threshold: Some(threshold),
            ..self
        }
    }
}

/// Metrics bundle returned across the never-fail scoring boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricsReport {
    /// Scoring succeeded
    Scored(Metrics),
    /// Input was malformed; the paired reward is the failure sentinel
    Failed { error: String, domain: Domain },
}

impl MetricsReport {
    pub fn metrics(&self) -> Option<&Metrics> {
        match self {
            MetricsReport::Scored(metrics) => Some(metrics),
            MetricsReport::Failed { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            MetricsReport::Scored(_) => None,
            MetricsReport::Failed { error, .. } => Some(error),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, MetricsReport::Failed { .. })
    }

    pub fn domain(&self) -> Domain {
        match self {
            MetricsReport::Scored(metrics) => metrics.domain,
            MetricsReport::Failed { domain, .. } => *domain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_matrix_partitions_batch() {
        let y_true = [0, 1, 0, 1, 1, 0];
        let y_pred = [0, 1, 1, 0, 1, 0];
        let matrix = ConfusionMatrix::from_labels(&y_true, &y_pred);
        assert_eq!(matrix.true_negatives, 2);
        assert_eq!(matrix.false_positives, 1);
        assert_eq!(matrix.false_negatives, 1);
        assert_eq!(matrix.true_positives, 2);
        assert_eq!(matrix.total(), y_true.len());
    }

    #[test]
    fn test_zero_division_yields_zero() {
        let matrix = ConfusionMatrix::from_labels(&[0, 0, 0], &[0, 0, 0]);
        assert_eq!(matrix.precision(), 0.0);
        assert_eq!(matrix.recall(), 0.0);
        assert_eq!(matrix.f1(), 0.0);
        assert_eq!(matrix.accuracy(), 1.0);
    }

    #[test]
    fn test_auc_perfect_separation() {
        let auc = roc_auc(&[0, 1, 0, 1, 0], &[0.2, 0.8, 0.3, 0.9, 0.4]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_with_ties() {
        // One positive/negative pair tied: (3 + 0.5) / 4
        let auc = roc_auc(&[0, 0, 1, 1], &[0.1, 0.6, 0.6, 0.9]).unwrap();
        assert!((auc - 0.875).abs() < 1e-12);
    }

    #[test]
    fn test_auc_undefined_for_single_class() {
        assert!(roc_auc(&[1, 1, 1], &[0.2, 0.5, 0.9]).is_none());
        assert!(roc_auc(&[0], &[0.3]).is_none());
    }
}
