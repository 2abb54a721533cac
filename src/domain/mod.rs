//! Classification domains and their reward profiles.
//!
//! Each [`Domain`] selects a [`RewardWeights`] profile and a
//! [`ThresholdRange`] for the deterministic sweep. Domains where a missed
//! positive is costlier carry heavier false-negative penalties and sweep
//! lower thresholds.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Clinical classification context.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    /// Dengue fever screening
    #[default]
    Dengue,
    /// Chronic kidney disease
    Kidney,
    /// Mental health risk assessment
    MentalHealth,
}

impl Domain {
    /// All domains in declaration order.
    pub const ALL: [Domain; 3] = [Domain::Dengue, Domain::Kidney, Domain::MentalHealth];

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Dengue => "dengue",
            Domain::Kidney => "kidney",
            Domain::MentalHealth => "mental_health",
        }
    }

    /// Parse a domain name, falling back to the default profile.
    ///
    /// Only for lenient string boundaries; use `str::parse` to reject
    /// unknown names.
    pub fn resolve(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            warn!(requested = name, fallback = %Domain::default(), "Unknown domain, using default profile");
            Domain::default()
        })
    }

    /// Static reward weights for this domain.
    pub fn default_weights(&self) -> RewardWeights {
        match self {
            Domain::Dengue => RewardWeights {
                accuracy: 0.25,
                precision: 0.20,
                recall: 0.30,
                f1: 0.15,
                auc: 0.10,
                false_negative_penalty: -2.0,
                false_positive_penalty: -0.5,
            },
            Domain::Kidney => RewardWeights {
                accuracy: 0.20,
                precision: 0.25,
                recall: 0.25,
                f1: 0.20,
                auc: 0.10,
                false_negative_penalty: -1.5,
                false_positive_penalty: -1.0,
            },
            Domain::MentalHealth => RewardWeights {
                accuracy: 0.30,
                precision: 0.15,
                recall: 0.25,
                f1: 0.20,
                auc: 0.10,
                false_negative_penalty: -1.8,
                false_positive_penalty: -0.3,
            },
        }
    }

    /// Threshold range swept when searching for the optimal cutoff.
    pub fn threshold_range(&self) -> ThresholdRange {
        match self {
            Domain::Dengue => ThresholdRange::new(0.3, 0.8, 0.02),
            Domain::Kidney => ThresholdRange::new(0.4, 0.9, 0.02),
            Domain::MentalHealth => ThresholdRange::new(0.2, 0.7, 0.02),
        }
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Domain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "dengue" => Ok(Domain::Dengue),
            "kidney" => Ok(Domain::Kidney),
            "mental_health" => Ok(Domain::MentalHealth),
            _ => Err(format!("Unknown domain: {}", s)),
        }
    }
}

// ============================================================================
// Reward Weights
// ============================================================================

/// Weights for combining classification metrics into a reward.
///
/// The five metric weights are non-negative and sum to 1.0. The two
/// penalties are negative and scale the fraction of the batch misclassified
/// in each direction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardWeights {
    /// Weight for accuracy
    pub accuracy: f64,
    /// Weight for precision
    pub precision: f64,
    /// Weight for recall
    pub recall: f64,
    /// Weight for F1 score
    pub f1: f64,
    /// Weight for ROC AUC (only applied when AUC is defined)
    pub auc: f64,
    /// Penalty per unit fraction of false negatives
    pub false_negative_penalty: f64,
    /// Penalty per unit fraction of false positives
    pub false_positive_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Domain::default().default_weights()
    }
}

impl RewardWeights {
    /// Sum of the five metric weights.
    pub fn metric_sum(&self) -> f64 {
        self.accuracy + self.precision + self.recall + self.f1 + self.auc
    }

    /// Rescale the metric weights to sum to 1.0, leaving penalties untouched.
    pub fn normalized(&self) -> Self {
        let total = self.metric_sum();
        if total <= 0.0 {
            return *self;
        }
        Self {
            accuracy: self.accuracy / total,
            precision: self.precision / total,
            recall: self.recall / total,
            f1: self.f1 / total,
            auc: self.auc / total,
            ..*self
        }
    }
}

// ============================================================================
// Threshold Range
// ============================================================================

/// Half-open threshold range `[start, end)` scanned in ascending steps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdRange {
    /// First threshold (inclusive)
    pub start: f64,
    /// Upper bound (exclusive)
    pub end: f64,
    /// Step between consecutive thresholds
    pub step: f64,
}

impl ThresholdRange {
    /// Create a new range.
    pub fn new(start: f64, end: f64, step: f64) -> Self {
        Self { start, end, step }
    }

    /// Thresholds in ascending scan order.
    ///
    /// Values are `start + i * step`; the count tolerates float noise in
    /// `(end - start) / step` so `end` itself is never emitted.
    pub fn thresholds(&self) -> Vec<f64> {
        if self.step <= 0.0 || self.end <= self.start {
            return Vec::new();
        }
        let count = ((self.end - self.start) / self.step - 1e-9).ceil() as usize;
        (0..count)
            .map(|i| self.start + i as f64 * self.step)
            .collect()
    }
}
