//! Reward aggregation over batches of serving-layer prediction results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::calculator::RewardCalculator;
use super::metrics::MetricsReport;
use crate::domain::Domain;

/// Status value marking a prediction that completed.
pub const SUCCESS_STATUS: &str = "success";

fn default_probability() -> f64 {
    0.5
}

/// One prediction result as produced by the serving layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    #[serde(default)]
    pub prediction: u8,
    #[serde(default = "default_probability")]
    pub probability: f64,
    pub status: String,
    /// Ground truth, when known
    #[serde(default)]
    pub true_label: Option<u8>,
}

impl PredictionRecord {
    pub fn is_success(&self) -> bool {
        self.status == SUCCESS_STATUS
    }
}

/// Reward for a single processed record.
///
/// `reward` is `None` when the record carried no ground truth; its
/// `metrics` then hold the error explaining why it was not scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordReward {
    pub record_index: usize,
    pub reward: Option<f64>,
    pub metrics: MetricsReport,
    pub prediction: u8,
    pub probability: f64,
}

/// Aggregate report for a batch of prediction results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub total_records: usize,
    pub processed_records: usize,
    /// Records whose status was not `success`
    pub skipped_records: usize,
    /// Processed records without a ground-truth label
    pub unlabeled_records: usize,
    /// Mean over the labelled records only
    pub average_reward: f64,
    pub total_reward: f64,
    pub individual_rewards: Vec<RecordReward>,
    pub domain: Domain,
    pub timestamp: DateTime<Utc>,
}

impl RewardCalculator {
    /// Process every successful record.
    ///
    /// Labelled records are scored as a one-sample batch. Unlabelled ones
    /// still count as processed but carry an error-tagged report and no
    /// reward, so they do not move the totals.
    pub fn calculate_batch_rewards(&self, records: &[PredictionRecord], domain: Domain) -> BatchReport {
        let mut individual_rewards = Vec::new();
        let mut skipped_records = 0;
        let mut unlabeled_records = 0;

        for (record_index, record) in records.iter().enumerate() {
            if !record.is_success() {
                skipped_records += 1;
                continue;
            }
            let (reward, metrics) = match record.true_label {
                Some(true_label) => {
                    let (reward, metrics) = self.calculate_medical_reward(
                        &[true_label],
                        &[record.prediction],
                        Some(&[record.probability]),
                        domain,
                    );
                    (Some(reward), metrics)
                }
                None => {
                    debug!(record_index, "Record has no ground truth, not scored");
                    unlabeled_records += 1;
                    let metrics = MetricsReport::Failed {
                        error: "record has no ground-truth label".to_string(),
                        domain,
                    };
                    (None, metrics)
                }
            };

            individual_rewards.push(RecordReward {
                record_index,
                reward,
                metrics,
                prediction: record.prediction,
                probability: record.probability,
            });
        }

        let scored: Vec<f64> = individual_rewards.iter().filter_map(|r| r.reward).collect();
        let total_reward: f64 = scored.iter().sum();
        let average_reward = if scored.is_empty() {
            0.0
        } else {
            total_reward / scored.len() as f64
        };

        info!(
            domain = %domain,
            total = records.len(),
            processed = individual_rewards.len(),
            unlabeled = unlabeled_records,
            average_reward = average_reward,
            "Batch rewards calculated"
        );

        BatchReport {
            total_records: records.len(),
            processed_records: individual_rewards.len(),
            skipped_records,
            unlabeled_records,
            average_reward,
            total_reward,
            individual_rewards,
            domain,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(prediction: u8, probability: f64, status: &str, label: Option<u8>) -> PredictionRecord {
        PredictionRecord {
            prediction,
            probability,
            status: status.to_string(),
            true_label: label,
        }
    }

    #[test]
    fn test_unlabeled_success_is_processed_without_reward() {
        let calculator = RewardCalculator::new();
        let report = calculator.calculate_batch_rewards(
            &[record(1, 0.9, "success", None), record(0, 0.1, "success", Some(0))],
            Domain::Dengue,
        );
        assert_eq!(report.total_records, 2);
        assert_eq!(report.processed_records, 2);
        assert_eq!(report.unlabeled_records, 1);

        let unlabeled = &report.individual_rewards[0];
        assert_eq!(unlabeled.record_index, 0);
        assert!(unlabeled.reward.is_none());
        assert!(unlabeled.metrics.is_error());

        let labeled = report.individual_rewards[1].reward.unwrap();
        assert_eq!(report.total_reward, labeled);
        assert_eq!(report.average_reward, labeled);
    }

    #[test]
    fn test_empty_batch_average_is_zero() {
        let calculator = RewardCalculator::new();
        let report = calculator.calculate_batch_rewards(&[], Domain::Kidney);
        assert_eq!(report.average_reward, 0.0);
        assert_eq!(report.processed_records, 0);
    }

    #[test]
    fn test_record_defaults_from_json() {
        let record: PredictionRecord = serde_json::from_str(r#"{"status": "error"}"#).unwrap();
        assert_eq!(record.prediction, 0);
        assert_eq!(record.probability, 0.5);
        assert!(record.true_label.is_none());
        assert!(!record.is_success());
    }
}
