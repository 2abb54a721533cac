use thiserror::Error;

use crate::domain::Domain;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A collaborator required for a domain was never registered. Retrying
    /// with different input cannot fix this.
    #[error("{resource} unavailable for domain '{domain}'")]
    ResourceUnavailable { domain: Domain, resource: ResourceKind },

    #[error("Invalid input: {0}")]
    InvalidInput(#[from] RewardError),

    #[error("Environment error: {0}")]
    Environment(#[from] EnvironmentError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Kind of external collaborator looked up in the model registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Scorer,
    Scaler,
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Scorer => write!(f, "Scorer"),
            ResourceKind::Scaler => write!(f, "Scaler"),
        }
    }
}

/// Malformed reward inputs
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RewardError {
    #[error("no samples to score")]
    EmptyInput,

    #[error("{field} has {actual} entries, expected {expected}")]
    LengthMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("label {value} at index {index} is not binary")]
    InvalidLabel { index: usize, value: u8 },

    #[error("probability at index {index} is not finite")]
    NonFiniteProbability { index: usize },
}

/// Errors raised while stepping the prediction environment
#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error("dataset contains no samples")]
    EmptyDataset,

    #[error("dataset has {rows} feature rows but {labels} labels")]
    DatasetShape { rows: usize, labels: usize },

    #[error("feature row {row} has {actual} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("action {action} outside action space of size {action_space}")]
    ActionOutOfRange { action: usize, action_space: usize },

    #[error("scorer failed: {0}")]
    Scorer(#[from] ModelError),

    #[error("scorer returned an empty probability row")]
    EmptyPrediction,

    #[error("scorer returned non-finite probability {value}")]
    NonFinitePrediction { value: f64 },
}

/// Errors from scorer and scaler collaborators
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ModelError {
    #[error("expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("invalid model parameters: {message}")]
    InvalidParameters { message: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for reward scoring
pub type RewardResult<T> = Result<T, RewardError>;

/// Result type alias for environment operations
pub type EnvResult<T> = Result<T, EnvironmentError>;
