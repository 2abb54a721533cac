//! Tabular Q-learning over discretised feature vectors.
//!
//! Continuous states are bucketed by rounding every feature to one decimal
//! place. This keeps the table small for low-dimensional inputs at the cost
//! of merging nearby states; wider inputs should use the DQN instead.

use std::collections::HashMap;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use super::agent::{argmax, make_rng, Agent, Exploration};
use super::replay::{ReplayMemory, Transition};
use crate::config::RlConfig;

/// Hashable bucket for a continuous state.
///
/// Stores each feature multiplied by ten and rounded, so `0.26` and `0.31`
/// both land in bucket `3`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey(Vec<i64>);

impl StateKey {
    pub fn from_state(state: &Array1<f64>) -> Self {
        Self(state.iter().map(|x| (x * 10.0).round() as i64).collect())
    }
}

/// Q-table agent with lazily initialised rows.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    q_table: HashMap<StateKey, Vec<f64>>,
    memory: ReplayMemory,
    exploration: Exploration,
    learning_rate: f64,
    gamma: f64,
    state_size: usize,
    action_size: usize,
    rng: StdRng,
}

impl QLearningAgent {
    pub fn new(state_size: usize, action_size: usize, config: &RlConfig) -> Self {
        info!(state_size, action_size, "QLearningAgent initialized");
        Self {
            q_table: HashMap::new(),
            memory: ReplayMemory::new(config.memory_size),
            exploration: Exploration::new(config.epsilon, config.epsilon_decay, config.epsilon_min),
            learning_rate: config.learning_rate,
            gamma: config.gamma,
            state_size,
            action_size: action_size.max(1),
            rng: make_rng(config.seed),
        }
    }

    pub fn state_size(&self) -> usize {
        self.state_size
    }

    /// Q-values for a state, or `None` if it was never visited.
    pub fn q_values(&self, state: &Array1<f64>) -> Option<&[f64]> {
        self.q_table
            .get(&StateKey::from_state(state))
            .map(Vec::as_slice)
    }

    /// Number of states in the table.
    pub fn table_size(&self) -> usize {
        self.q_table.len()
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn row_mut(&mut self, key: StateKey) -> &mut Vec<f64> {
        let action_size = self.action_size;
        self.q_table
            .entry(key)
            .or_insert_with(|| vec![0.0; action_size])
    }

    fn max_q(&mut self, key: StateKey) -> f64 {
        self.row_mut(key)
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

impl Agent for QLearningAgent {
    fn act(&mut self, state: &Array1<f64>) -> usize {
        if self.exploration.explore(&mut self.rng) {
            return self.rng.gen_range(0..self.action_size);
        }
        let row = self.row_mut(StateKey::from_state(state));
        argmax(row.iter())
    }

    fn greedy_action(&self, state: &Array1<f64>) -> usize {
        self.q_values(state).map_or(0, |row| argmax(row))
    }

    fn remember(&mut self, transition: Transition) {
        if transition.action >= self.action_size {
            warn!(
                action = transition.action,
                action_size = self.action_size,
                "Dropping transition with out-of-range action"
            );
            return;
        }
        self.memory.push(transition);
    }

    fn replay(&mut self, batch_size: usize) {
        let Some(batch) = self.memory.sample(batch_size, &mut self.rng) else {
            return;
        };

        for transition in batch {
            let key = StateKey::from_state(&transition.state);
            let next_key = StateKey::from_state(&transition.next_state);

            let next_max = self.max_q(next_key);
            let target = if transition.done {
                transition.reward
            } else {
                transition.reward + self.gamma * next_max
            };

            let learning_rate = self.learning_rate;
            let current = &mut self.row_mut(key)[transition.action];
            *current += learning_rate * (target - *current);
        }

        self.exploration.decay();
        debug!(
            epsilon = self.exploration.epsilon(),
            states = self.q_table.len(),
            "Q-table replay complete"
        );
    }

    fn epsilon(&self) -> f64 {
        self.exploration.epsilon()
    }

    fn action_space_size(&self) -> usize {
        self.action_size
    }
}
