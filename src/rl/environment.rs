//! Sequential decision process over a labelled validation set.
//!
//! Each step scores one sample at a threshold chosen by the agent and returns
//! a shaped single-sample reward:
//!
//! ```text
//! correct   →  1.0 + c     ∈ [1, 2]
//! incorrect → -2.0 - c     ∈ [-3, -2]
//! ```
//!
//! where `c` is the predicted-class probability clamped to `[0, 1]`.

use std::sync::Arc;

use ndarray::{Array1, Array2, Axis};
use serde::Serialize;
use tracing::trace;

use crate::error::{EnvResult, EnvironmentError};
use crate::registry::{Scaler, Scorer};

/// Raw feature rows paired with integer labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledDataset {
    features: Array2<f64>,
    labels: Vec<u8>,
}

impl LabeledDataset {
    pub fn new(features: Array2<f64>, labels: Vec<u8>) -> EnvResult<Self> {
        if features.nrows() != labels.len() {
            return Err(EnvironmentError::DatasetShape {
                rows: features.nrows(),
                labels: labels.len(),
            });
        }
        if labels.is_empty() || features.ncols() == 0 {
            return Err(EnvironmentError::EmptyDataset);
        }
        Ok(Self { features, labels })
    }

    /// Build from row vectors; rows must share one width.
    pub fn from_rows(rows: &[Vec<f64>], labels: Vec<u8>) -> EnvResult<Self> {
        let width = rows.first().map_or(0, Vec::len);
        if let Some((row, ragged)) = rows.iter().enumerate().find(|(_, r)| r.len() != width) {
            return Err(EnvironmentError::RaggedRow {
                row,
                expected: width,
                actual: ragged.len(),
            });
        }
        let flat: Vec<f64> = rows.iter().flatten().copied().collect();
        let features = Array2::from_shape_vec((rows.len(), width), flat).map_err(|_| {
            EnvironmentError::DatasetShape {
                rows: rows.len(),
                labels: labels.len(),
            }
        })?;
        Self::new(features, labels)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[u8] {
        &self.labels
    }

    pub fn row(&self, index: usize) -> Array1<f64> {
        self.features.row(index).to_owned()
    }
}

/// Diagnostics attached to every step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StepInfo {
    pub prediction_probability: f64,
    pub threshold: f64,
    pub correct: bool,
}

/// Outcome of one environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub next_state: Array1<f64>,
    pub reward: f64,
    pub done: bool,
    pub info: StepInfo,
}

/// A class decision with its probability.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub predicted_label: usize,
    /// Raw probability reported for the decision
    pub probability: f64,
    /// Probability of the predicted class, clamped to `[0, 1]`
    pub confidence: f64,
}

/// Decode one scorer output row.
///
/// A single value is a positive-class probability thresholded at `threshold`.
/// A vector is decoded by arg-max (first index on ties) and the threshold is
/// not consulted. Any non-finite value is rejected.
pub fn decide(row: &[f64], threshold: f64) -> EnvResult<Decision> {
    if let Some(&value) = row.iter().find(|p| !p.is_finite()) {
        return Err(EnvironmentError::NonFinitePrediction { value });
    }
    match row {
        [] => Err(EnvironmentError::EmptyPrediction),
        [p] => {
            let predicted_label = usize::from(*p >= threshold);
            let class_probability = if predicted_label == 1 { *p } else { 1.0 - *p };
            Ok(Decision {
                predicted_label,
                probability: *p,
                confidence: class_probability.clamp(0.0, 1.0),
            })
        }
        _ => {
            let (predicted_label, &max) = row
                .iter()
                .enumerate()
                .fold((0, &row[0]), |best, (i, p)| if *p > *best.1 { (i, p) } else { best });
            Ok(Decision {
                predicted_label,
                probability: max,
                confidence: max.clamp(0.0, 1.0),
            })
        }
    }
}

/// Whether a decision matches the ground truth.
///
/// For vector outputs with a binary label, only "predicted the positive
/// class" is compared against "label is positive".
pub fn is_correct(decision: &Decision, label: u8, multiclass: bool) -> bool {
    if multiclass && label <= 1 {
        (decision.predicted_label == 1) == (label == 1)
    } else {
        decision.predicted_label == usize::from(label)
    }
}

/// Shaped reward for one classification outcome.
///
/// A NaN confidence counts as zero.
pub fn shaped_reward(correct: bool, confidence: f64) -> f64 {
    let c = if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    };
    if correct {
        1.0 + c
    } else {
        -2.0 - c
    }
}

/// Threshold encoded by a discrete action: `(action + 1) / K`.
pub fn action_to_threshold(action: usize, action_space_size: usize) -> f64 {
    (action + 1) as f64 / action_space_size as f64
}

/// Wraps a scorer, a scaler and a dataset into a step-wise environment.
pub struct PredictionEnvironment {
    scorer: Arc<dyn Scorer>,
    scaler: Arc<dyn Scaler>,
    dataset: LabeledDataset,
    action_space_size: usize,
    cursor: usize,
}

impl PredictionEnvironment {
    pub fn new(
        scorer: Arc<dyn Scorer>,
        scaler: Arc<dyn Scaler>,
        dataset: LabeledDataset,
        action_space_size: usize,
    ) -> Self {
        Self {
            scorer,
            scaler,
            dataset,
            action_space_size: action_space_size.max(1),
            cursor: 0,
        }
    }

    pub fn action_space_size(&self) -> usize {
        self.action_space_size
    }

    /// Steps in one full pass over the dataset.
    pub fn max_steps(&self) -> usize {
        self.dataset.len()
    }

    pub fn state_size(&self) -> usize {
        self.dataset.n_features()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Rewind to the first sample and return its scaled features.
    pub fn reset(&mut self) -> EnvResult<Array1<f64>> {
        self.cursor = 0;
        self.state()
    }

    /// Scaled features of the sample under the cursor.
    pub fn state(&mut self) -> EnvResult<Array1<f64>> {
        if self.cursor >= self.dataset.len() {
            self.cursor = 0;
        }
        Ok(self.scaler.transform(&self.dataset.row(self.cursor))?)
    }

    pub fn step(&mut self, action: usize) -> EnvResult<Step> {
        if action >= self.action_space_size {
            return Err(EnvironmentError::ActionOutOfRange {
                action,
                action_space: self.action_space_size,
            });
        }
        if self.cursor >= self.dataset.len() {
            self.cursor = 0;
        }

        let label = self.dataset.labels[self.cursor];
        let scaled = self.state()?;
        let output = self.scorer.predict(&scaled.clone().insert_axis(Axis(0)))?;
        let row = output
            .rows()
            .into_iter()
            .next()
            .ok_or(EnvironmentError::EmptyPrediction)?
            .to_vec();

        let threshold = action_to_threshold(action, self.action_space_size);
        let decision = decide(&row, threshold)?;
        let correct = is_correct(&decision, label, row.len() > 1);
        let reward = shaped_reward(correct, decision.confidence);

        self.cursor += 1;
        let done = self.cursor >= self.dataset.len();
        let next_state = if done {
            Array1::zeros(scaled.len())
        } else {
            self.state()?
        };

        trace!(
            step = self.cursor,
            action = action,
            threshold = threshold,
            predicted = decision.predicted_label,
            actual = label,
            reward = reward,
            "Environment step"
        );

        Ok(Step {
            next_state,
            reward,
            done,
            info: StepInfo {
                prediction_probability: decision.probability,
                threshold,
                correct,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{IdentityScaler, MockScorer};
    use ndarray::arr2;

    fn env_with(outputs: Vec<f64>, labels: Vec<u8>) -> PredictionEnvironment {
        let width = outputs.len();
        let mut scorer = MockScorer::new();
        scorer
            .expect_predict()
            .returning(move |_| Ok(Array2::from_shape_vec((1, width), outputs.clone()).unwrap()));
        let n = labels.len();
        let dataset = LabeledDataset::new(Array2::from_elem((n, 2), 1.0), labels).unwrap();
        PredictionEnvironment::new(Arc::new(scorer), Arc::new(IdentityScaler), dataset, 10)
    }

    #[test]
    fn test_action_decoding() {
        assert!((action_to_threshold(0, 10) - 0.1).abs() < 1e-12);
        assert!((action_to_threshold(9, 10) - 1.0).abs() < 1e-12);
        assert!((action_to_threshold(4, 10) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_binary_correct_reward_uses_class_probability() {
        let mut env = env_with(vec![0.8], vec![1, 1]);
        env.reset().unwrap();
        let step = env.step(4).unwrap();
        assert!(step.info.correct);
        assert!((step.reward - 1.8).abs() < 1e-12);
        assert!(!step.done);
    }

    #[test]
    fn test_binary_negative_prediction_confidence() {
        // p = 0.8 below threshold 1.0: predicts 0 with confidence 0.2
        let mut env = env_with(vec![0.8], vec![1]);
        env.reset().unwrap();
        let step = env.step(9).unwrap();
        assert!(!step.info.correct);
        assert!((step.reward - (-2.2)).abs() < 1e-12);
        assert!(step.done);
    }

    #[test]
    fn test_terminal_state_is_zero_vector() {
        let mut env = env_with(vec![0.9], vec![1]);
        env.reset().unwrap();
        let step = env.step(0).unwrap();
        assert!(step.done);
        assert_eq!(step.next_state, Array1::<f64>::zeros(2));
    }

    #[test]
    fn test_cursor_wraps_after_done() {
        let mut env = env_with(vec![0.9], vec![1, 0]);
        env.reset().unwrap();
        env.step(0).unwrap();
        assert!(env.step(0).unwrap().done);
        assert_eq!(env.cursor(), 2);
        let step = env.step(0).unwrap();
        assert_eq!(env.cursor(), 1);
        assert!(!step.done);
    }

    #[test]
    fn test_multiclass_binary_label_rule() {
        // arg-max is class 1, label 1 is positive
        let mut env = env_with(vec![0.1, 0.7, 0.2], vec![1]);
        env.reset().unwrap();
        let step = env.step(0).unwrap();
        assert!(step.info.correct);
        assert!((step.info.prediction_probability - 0.7).abs() < 1e-12);
        assert!((step.reward - 1.7).abs() < 1e-12);
    }

    #[test]
    fn test_multiclass_label_compared_directly() {
        let mut env = env_with(vec![0.1, 0.2, 0.7], vec![2]);
        env.reset().unwrap();
        assert!(env.step(3).unwrap().info.correct);
    }

    #[test]
    fn test_multiclass_predicting_class_two_for_negative_label() {
        // Predicted class 2 is "not positive", matching label 0
        let decision = decide(&[0.1, 0.2, 0.7], 0.5).unwrap();
        assert!(is_correct(&decision, 0, true));
        assert!(!is_correct(&decision, 1, true));
    }

    #[test]
    fn test_action_out_of_range() {
        let mut env = env_with(vec![0.5], vec![1]);
        let err = env.step(10).unwrap_err();
        assert!(matches!(
            err,
            EnvironmentError::ActionOutOfRange {
                action: 10,
                action_space: 10
            }
        ));
    }

    #[test]
    fn test_confidence_clamped_for_out_of_range_scores() {
        assert_eq!(shaped_reward(true, 1.7), 2.0);
        assert_eq!(shaped_reward(false, -0.3), -2.0);
    }

    #[test]
    fn test_non_finite_scorer_output_is_an_error() {
        let mut env = env_with(vec![f64::NAN], vec![1]);
        env.reset().unwrap();
        let err = env.step(4).unwrap_err();
        assert!(matches!(err, EnvironmentError::NonFinitePrediction { value } if value.is_nan()));

        assert!(matches!(
            decide(&[0.2, f64::INFINITY], 0.5).unwrap_err(),
            EnvironmentError::NonFinitePrediction { .. }
        ));
        assert_eq!(shaped_reward(true, f64::NAN), 1.0);
        assert_eq!(shaped_reward(false, f64::NAN), -2.0);
    }

    #[test]
    fn test_ragged_rows_report_offending_row() {
        let err = LabeledDataset::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0], vec![5.0]], vec![0, 1, 0])
            .unwrap_err();
        assert!(matches!(
            err,
            EnvironmentError::RaggedRow {
                row: 2,
                expected: 2,
                actual: 1
            }
        ));
        assert_eq!(err.to_string(), "feature row 2 has 1 values, expected 2");
    }

    #[test]
    fn test_dataset_shape_checked() {
        let err = LabeledDataset::new(arr2(&[[1.0], [2.0]]), vec![1]).unwrap_err();
        assert!(matches!(err, EnvironmentError::DatasetShape { rows: 2, labels: 1 }));
        assert!(matches!(
            LabeledDataset::from_rows(&[], vec![]).unwrap_err(),
            EnvironmentError::EmptyDataset
        ));
    }
}
