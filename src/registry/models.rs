//! Concrete scorers and scalers used by the CLI and in tests.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use super::{Scaler, Scorer};
use crate::error::ModelError;

fn check_width(expected: usize, actual: usize) -> Result<(), ModelError> {
    if expected != actual {
        return Err(ModelError::DimensionMismatch { expected, actual });
    }
    Ok(())
}

/// Binary logistic regression: one sigmoid output per row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticScorer {
    pub weights: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
}

impl LogisticScorer {
    pub fn new(weights: Vec<f64>, bias: f64) -> Result<Self, ModelError> {
        if weights.is_empty() {
            return Err(ModelError::InvalidParameters {
                message: "logistic scorer needs at least one weight".to_string(),
            });
        }
        Ok(Self { weights, bias })
    }
}

impl Scorer for LogisticScorer {
    fn predict(&self, features: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        check_width(self.weights.len(), features.ncols())?;
        let weights = Array1::from(self.weights.clone());
        let logits = features.dot(&weights) + self.bias;
        let proba = logits.mapv(|z| 1.0 / (1.0 + (-z).exp()));
        Ok(proba.insert_axis(Axis(1)))
    }
}

/// Multinomial linear model with a softmax over class logits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxScorer {
    /// One weight row per class
    pub weights: Vec<Vec<f64>>,
    /// One bias per class; zeros when omitted
    #[serde(default)]
    pub biases: Vec<f64>,
}

impl SoftmaxScorer {
    pub fn new(weights: Vec<Vec<f64>>, biases: Vec<f64>) -> Result<Self, ModelError> {
        let scorer = Self { weights, biases };
        scorer.coefficients()?;
        Ok(scorer)
    }

    /// Weight matrix shaped `(features, classes)` and the bias vector.
    fn coefficients(&self) -> Result<(Array2<f64>, Array1<f64>), ModelError> {
        let classes = self.weights.len();
        if classes < 2 {
            return Err(ModelError::InvalidParameters {
                message: "softmax scorer needs at least two classes".to_string(),
            });
        }
        let width = self.weights[0].len();
        if width == 0 || self.weights.iter().any(|row| row.len() != width) {
            return Err(ModelError::InvalidParameters {
                message: "softmax weight rows must share a non-zero width".to_string(),
            });
        }
        let biases = if self.biases.is_empty() {
            Array1::zeros(classes)
        } else if self.biases.len() == classes {
            Array1::from(self.biases.clone())
        } else {
            return Err(ModelError::InvalidParameters {
                message: format!("expected {} biases, got {}", classes, self.biases.len()),
            });
        };
        let flat: Vec<f64> = self.weights.iter().flatten().copied().collect();
        let matrix = Array2::from_shape_vec((classes, width), flat).map_err(|e| {
            ModelError::InvalidParameters {
                message: e.to_string(),
            }
        })?;
        Ok((matrix.reversed_axes(), biases))
    }
}

impl Scorer for SoftmaxScorer {
    fn predict(&self, features: &Array2<f64>) -> Result<Array2<f64>, ModelError> {
        let (weights, biases) = self.coefficients()?;
        check_width(weights.nrows(), features.ncols())?;
        let mut logits = features.dot(&weights) + &biases;
        for mut row in logits.rows_mut() {
            let max = row.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
            row.mapv_inplace(|v| (v - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|v| v / sum);
        }
        Ok(logits)
    }
}

/// Standardisation with fitted mean and scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ModelError> {
        if mean.len() != scale.len() {
            return Err(ModelError::InvalidParameters {
                message: format!(
                    "mean has {} entries but scale has {}",
                    mean.len(),
                    scale.len()
                ),
            });
        }
        Ok(Self { mean, scale })
    }
}

impl Scaler for StandardScaler {
    fn transform(&self, row: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
        check_width(self.mean.len(), row.len())?;
        // A zero scale means the feature was constant during fitting.
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&mean, &scale))| {
                let scale = if scale == 0.0 { 1.0 } else { scale };
                (x - mean) / scale
            })
            .collect())
    }
}

/// Passes features through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityScaler;

impl Scaler for IdentityScaler {
    fn transform(&self, row: &Array1<f64>) -> Result<Array1<f64>, ModelError> {
        Ok(row.clone())
    }
}
