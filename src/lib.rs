//! # Clinical Threshold RL
//!
//! Decision-threshold optimization for binary clinical classifiers. Given a
//! frozen scorer that emits probabilities, find the cutoff that maximizes a
//! domain-weighted reward with asymmetric error costs, and refine it with
//! reinforcement learning.
//!
//! ## Features
//!
//! - **Medical reward**: weighted accuracy, precision, recall, F1 and AUC,
//!   minus false-negative and false-positive penalties scaled by fraction
//! - **Threshold sweep**: deterministic search over a per-domain range
//! - **RL agents**: tabular Q-learning and a DQN over a discrete threshold grid
//! - **Adaptive weights**: reward weights retuned from performance history
//! - **Batch evaluation**: rewards for serving-layer prediction records
//!
//! ## Architecture
//!
//! ```text
//! labels + probabilities ─► RewardCalculator ─► sweep ─► ThresholdResult
//!                                   ▲
//! ModelRegistry ─► PredictionEnvironment ◄─► Agent (Q-table | DQN)
//!                                   │
//!                         AdaptiveRewardSystem (history ─► weights)
//! ```
//!
//! ## Example
//!
//! ```
//! use clinical_threshold_rl::{Domain, RewardCalculator};
//!
//! let calculator = RewardCalculator::new();
//! let result = calculator.find_optimal_threshold(
//!     &[0, 1, 0, 1, 0],
//!     &[0.2, 0.8, 0.3, 0.9, 0.4],
//!     Domain::Dengue,
//! );
//! assert!(result.threshold >= 0.3 && result.threshold < 0.8);
//! ```

/// Adaptive reward weighting from performance history.
pub mod adaptive;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Classification domains and reward profiles.
pub mod domain;
/// Error types and result aliases.
pub mod error;
/// Serving-layer entry points.
pub mod optimizer;
/// Scorer and scaler collaborators.
pub mod registry;
/// Reward calculation and threshold sweep.
pub mod reward;
/// Reinforcement learning environment and agents.
pub mod rl;

pub use adaptive::AdaptiveRewardSystem;
pub use config::Config;
pub use domain::{Domain, RewardWeights, ThresholdRange};
pub use error::{AppError, AppResult};
pub use optimizer::{optimize_threshold_with_rl, ModelEvaluation, ThresholdOptimizer};
pub use registry::ModelRegistry;
pub use reward::{Metrics, MetricsReport, RewardCalculator, ThresholdResult};
pub use rl::{TrainedAgent, TrainingOutcome, TrainingReport};
