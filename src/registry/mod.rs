//! Scorer and scaler collaborators, looked up per domain.
//!
//! The classifier and the feature scaler live outside this crate. They are
//! reached only through the [`Scorer`] and [`Scaler`] traits, and a
//! [`ModelRegistry`] built once at startup maps each [`Domain`] to its pair.

pub mod models;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::domain::Domain;
use crate::error::{AppError, AppResult, ModelError, ResourceKind};

pub use models::{IdentityScaler, LogisticScorer, SoftmaxScorer, StandardScaler};

/// A frozen classifier.
///
/// Each output row is either a single sigmoid probability (binary model) or
/// one probability per class.
#[cfg_attr(test, mockall::automock)]
pub trait Scorer: Send + Sync {
    fn predict(&self, features: &Array2<f64>) -> Result<Array2<f64>, ModelError>;
}

/// Feature preprocessing applied before every call into a [`Scorer`].
#[cfg_attr(test, mockall::automock)]
pub trait Scaler: Send + Sync {
    fn transform(&self, row: &Array1<f64>) -> Result<Array1<f64>, ModelError>;
}

/// Scorer and scaler for each domain.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    scorers: HashMap<Domain, Arc<dyn Scorer>>,
    scalers: HashMap<Domain, Arc<dyn Scaler>>,
}

impl ModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scorer and scaler pair for a domain, replacing any existing one.
    pub fn register(
        &mut self,
        domain: Domain,
        scorer: Arc<dyn Scorer>,
        scaler: Arc<dyn Scaler>,
    ) -> &mut Self {
        self.scorers.insert(domain, scorer);
        self.scalers.insert(domain, scaler);
        self
    }

    pub fn register_scorer(&mut self, domain: Domain, scorer: Arc<dyn Scorer>) -> &mut Self {
        self.scorers.insert(domain, scorer);
        self
    }

    pub fn register_scaler(&mut self, domain: Domain, scaler: Arc<dyn Scaler>) -> &mut Self {
        self.scalers.insert(domain, scaler);
        self
    }

    pub fn scorer(&self, domain: Domain) -> AppResult<Arc<dyn Scorer>> {
        self.scorers
            .get(&domain)
            .cloned()
            .ok_or(AppError::ResourceUnavailable {
                domain,
                resource: ResourceKind::Scorer,
            })
    }

    pub fn scaler(&self, domain: Domain) -> AppResult<Arc<dyn Scaler>> {
        self.scalers
            .get(&domain)
            .cloned()
            .ok_or(AppError::ResourceUnavailable {
                domain,
                resource: ResourceKind::Scaler,
            })
    }

    /// Domains with both collaborators registered.
    pub fn domains(&self) -> Vec<Domain> {
        Domain::ALL
            .iter()
            .copied()
            .filter(|d| self.scorers.contains_key(d) && self.scalers.contains_key(d))
            .collect()
    }
}

impl fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("scorers", &self.scorers.keys().collect::<Vec<_>>())
            .field("scalers", &self.scalers.keys().collect::<Vec<_>>())
            .finish()
    }
}
