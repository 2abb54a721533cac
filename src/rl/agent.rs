//! The policy contract shared by the tabular and deep agents.

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::dqn::DqnAgent;
use super::environment::action_to_threshold;
use super::q_learning::QLearningAgent;
use super::replay::Transition;

/// An ε-greedy policy over a discrete threshold action space.
pub trait Agent {
    /// Choose an action, exploring with probability ε.
    fn act(&mut self, state: &Array1<f64>) -> usize;

    /// Best known action for a state, without exploration.
    fn greedy_action(&self, state: &Array1<f64>) -> usize;

    /// Store a transition in replay memory.
    fn remember(&mut self, transition: Transition);

    /// Learn from a random batch of stored transitions, then decay ε.
    ///
    /// Does nothing while memory holds fewer than `batch_size` transitions.
    fn replay(&mut self, batch_size: usize);

    fn epsilon(&self) -> f64;

    fn action_space_size(&self) -> usize;
}

/// Multiplicative ε decay with a floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exploration {
    epsilon: f64,
    decay: f64,
    min: f64,
}

impl Exploration {
    pub fn new(epsilon: f64, decay: f64, min: f64) -> Self {
        Self {
            epsilon: epsilon.max(min),
            decay,
            min,
        }
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn decay(&mut self) {
        self.epsilon = (self.epsilon * self.decay).max(self.min);
    }

    /// Whether the next action should be random.
    pub fn explore<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        rng.gen::<f64>() <= self.epsilon
    }
}

/// Seeded generator when a seed is given, entropy otherwise.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax<'a, I>(values: I) -> usize
where
    I: IntoIterator<Item = &'a f64>,
{
    let mut best_index = 0;
    let mut best = f64::NEG_INFINITY;
    for (i, &v) in values.into_iter().enumerate() {
        if v > best {
            best = v;
            best_index = i;
        }
    }
    best_index
}

/// Which agent architecture was trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Tabular,
    Deep,
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentKind::Tabular => write!(f, "tabular"),
            AgentKind::Deep => write!(f, "deep"),
        }
    }
}

/// A trained policy of either architecture.
#[derive(Debug, Clone)]
pub enum TrainedAgent {
    Tabular(QLearningAgent),
    Deep(DqnAgent),
}

impl TrainedAgent {
    pub fn kind(&self) -> AgentKind {
        match self {
            TrainedAgent::Tabular(_) => AgentKind::Tabular,
            TrainedAgent::Deep(_) => AgentKind::Deep,
        }
    }

    fn inner(&self) -> &dyn Agent {
        match self {
            TrainedAgent::Tabular(agent) => agent,
            TrainedAgent::Deep(agent) => agent,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Agent {
        match self {
            TrainedAgent::Tabular(agent) => agent,
            TrainedAgent::Deep(agent) => agent,
        }
    }

    /// Threshold chosen by the greedy policy for a state.
    pub fn greedy_threshold(&self, state: &Array1<f64>) -> f64 {
        action_to_threshold(self.greedy_action(state), self.action_space_size())
    }
}

impl Agent for TrainedAgent {
    fn act(&mut self, state: &Array1<f64>) -> usize {
        self.inner_mut().act(state)
    }

    fn greedy_action(&self, state: &Array1<f64>) -> usize {
        self.inner().greedy_action(state)
    }

    fn remember(&mut self, transition: Transition) {
        self.inner_mut().remember(transition)
    }

    fn replay(&mut self, batch_size: usize) {
        self.inner_mut().replay(batch_size)
    }

    fn epsilon(&self) -> f64 {
        self.inner().epsilon()
    }

    fn action_space_size(&self) -> usize {
        self.inner().action_space_size()
    }
}
