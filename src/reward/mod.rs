//! Domain-weighted reward calculation.
//!
//! A reward combines accuracy, precision, recall, F1 and (when defined) ROC
//! AUC under a per-domain [`RewardWeights`](crate::domain::RewardWeights)
//! profile, then subtracts asymmetric penalties proportional to the fraction
//! of false negatives and false positives.
//!
//! ```text
//! base_reward     = Σ weight_i · metric_i
//! medical_penalty = fn_penalty · fn/N + fp_penalty · fp/N
//! total_reward    = base_reward + medical_penalty
//! ```

pub mod batch;
pub mod calculator;
pub mod metrics;

pub use batch::{BatchReport, PredictionRecord, RecordReward, SUCCESS_STATUS};
pub use calculator::{apply_threshold, RewardCalculator, ThresholdResult, FAILURE_REWARD};
pub use metrics::{roc_auc, ConfusionMatrix, Metrics, MetricsReport};
