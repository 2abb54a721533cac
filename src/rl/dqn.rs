//! Deep Q-network agent for wider feature vectors.
//!
//! Two identically shaped multilayer perceptrons: the online network is
//! trained, the target network supplies bootstrap values and only changes on
//! an explicit [`DqnAgent::sync`].
//!
//! ```text
//! state ─► Dense(h, ReLU) ─► Dense(h, ReLU) ─► Dense(K, linear) ─► Q(s, ·)
//! ```
//!
//! Replay fits the online network one transition at a time: each sampled
//! transition gets its own forward pass, MSE gradient and Adam step.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info, warn};

use super::agent::{argmax, make_rng, Agent, Exploration};
use super::replay::{ReplayMemory, Transition};
use crate::config::RlConfig;

const BETA1: f64 = 0.9;
const BETA2: f64 = 0.999;
const ADAM_EPSILON: f64 = 1e-7;

fn relu(x: &Array1<f64>) -> Array1<f64> {
    x.mapv(|v| v.max(0.0))
}

fn relu_mask(z: &Array1<f64>) -> Array1<f64> {
    z.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 })
}

fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    a.view()
        .insert_axis(Axis(1))
        .dot(&b.view().insert_axis(Axis(0)))
}

/// Fully connected layer with its Adam moment estimates.
#[derive(Debug, Clone)]
struct Dense {
    weights: Array2<f64>, // (in, out)
    bias: Array1<f64>,
    m_w: Array2<f64>,
    v_w: Array2<f64>,
    m_b: Array1<f64>,
    v_b: Array1<f64>,
}

impl Dense {
    /// Glorot-uniform weights, zero bias.
    fn glorot<R: Rng + ?Sized>(inputs: usize, outputs: usize, rng: &mut R) -> Self {
        let limit = (6.0 / (inputs + outputs) as f64).sqrt();
        let weights = Array2::from_shape_fn((inputs, outputs), |_| rng.gen_range(-limit..=limit));
        Self {
            weights,
            bias: Array1::zeros(outputs),
            m_w: Array2::zeros((inputs, outputs)),
            v_w: Array2::zeros((inputs, outputs)),
            m_b: Array1::zeros(outputs),
            v_b: Array1::zeros(outputs),
        }
    }

    fn forward(&self, x: &Array1<f64>) -> Array1<f64> {
        x.dot(&self.weights) + &self.bias
    }

    fn adam_step(&mut self, grad_w: &Array2<f64>, grad_b: &Array1<f64>, step_size: f64) {
        self.m_w = &self.m_w * BETA1 + grad_w * (1.0 - BETA1);
        self.v_w = &self.v_w * BETA2 + &grad_w.mapv(|g| g * g) * (1.0 - BETA2);
        self.m_b = &self.m_b * BETA1 + grad_b * (1.0 - BETA1);
        self.v_b = &self.v_b * BETA2 + &grad_b.mapv(|g| g * g) * (1.0 - BETA2);

        self.weights
            .zip_mut_with(&(&self.m_w / &self.v_w.mapv(|v| v.sqrt() + ADAM_EPSILON)), |w, d| {
                *w -= step_size * d
            });
        self.bias
            .zip_mut_with(&(&self.m_b / &self.v_b.mapv(|v| v.sqrt() + ADAM_EPSILON)), |b, d| {
                *b -= step_size * d
            });
    }
}

/// Three-layer action-value network trained with MSE and Adam.
#[derive(Debug, Clone)]
pub struct QNetwork {
    hidden1: Dense,
    hidden2: Dense,
    output: Dense,
    learning_rate: f64,
    steps: i32,
}

impl QNetwork {
    pub fn new<R: Rng + ?Sized>(
        state_size: usize,
        hidden_units: usize,
        action_size: usize,
        learning_rate: f64,
        rng: &mut R,
    ) -> Self {
        Self {
            hidden1: Dense::glorot(state_size, hidden_units, rng),
            hidden2: Dense::glorot(hidden_units, hidden_units, rng),
            output: Dense::glorot(hidden_units, action_size, rng),
            learning_rate,
            steps: 0,
        }
    }

    pub fn input_size(&self) -> usize {
        self.hidden1.weights.nrows()
    }

    pub fn output_size(&self) -> usize {
        self.output.weights.ncols()
    }

    /// Action values for one state.
    pub fn predict(&self, state: &Array1<f64>) -> Array1<f64> {
        let h1 = relu(&self.hidden1.forward(state));
        let h2 = relu(&self.hidden2.forward(&h1));
        self.output.forward(&h2)
    }

    /// One Adam step toward `target`; returns the loss before the step.
    pub fn fit(&mut self, state: &Array1<f64>, target: &Array1<f64>) -> f64 {
        let z1 = self.hidden1.forward(state);
        let a1 = relu(&z1);
        let z2 = self.hidden2.forward(&a1);
        let a2 = relu(&z2);
        let out = self.output.forward(&a2);

        let error = &out - target;
        let n = error.len() as f64;
        let loss = error.mapv(|e| e * e).sum() / n;

        let g_out = error * (2.0 / n);
        let g_z2 = self.output.weights.dot(&g_out) * relu_mask(&z2);
        let g_z1 = self.hidden2.weights.dot(&g_z2) * relu_mask(&z1);

        self.steps += 1;
        let step_size = self.learning_rate * (1.0 - BETA2.powi(self.steps)).sqrt()
            / (1.0 - BETA1.powi(self.steps));

        self.output.adam_step(&outer(&a2, &g_out), &g_out, step_size);
        self.hidden2.adam_step(&outer(&a1, &g_z2), &g_z2, step_size);
        self.hidden1.adam_step(&outer(state, &g_z1), &g_z1, step_size);

        loss
    }

    /// Overwrite this network's parameters with another's.
    pub fn copy_weights_from(&mut self, other: &QNetwork) {
        self.hidden1.weights.assign(&other.hidden1.weights);
        self.hidden1.bias.assign(&other.hidden1.bias);
        self.hidden2.weights.assign(&other.hidden2.weights);
        self.hidden2.bias.assign(&other.hidden2.bias);
        self.output.weights.assign(&other.output.weights);
        self.output.bias.assign(&other.output.bias);
    }
}

/// DQN agent with an online and a target network.
#[derive(Debug, Clone)]
pub struct DqnAgent {
    online: QNetwork,
    target: QNetwork,
    memory: ReplayMemory,
    exploration: Exploration,
    gamma: f64,
    state_size: usize,
    action_size: usize,
    rng: StdRng,
}

impl DqnAgent {
    pub fn new(state_size: usize, action_size: usize, config: &RlConfig) -> Self {
        let mut rng = make_rng(config.seed);
        let action_size = action_size.max(1);
        let online = QNetwork::new(
            state_size,
            config.hidden_units,
            action_size,
            config.learning_rate,
            &mut rng,
        );
        let target = online.clone();

        info!(state_size, action_size, hidden_units = config.hidden_units, "DqnAgent initialized");

        Self {
            online,
            target,
            memory: ReplayMemory::new(config.memory_size),
            exploration: Exploration::new(config.epsilon, config.epsilon_decay, config.epsilon_min),
            gamma: config.gamma,
            state_size,
            action_size,
            rng,
        }
    }

    /// Copy the online network into the target network.
    pub fn sync(&mut self) {
        self.target.copy_weights_from(&self.online);
        debug!("Target network synced");
    }

    pub fn online(&self) -> &QNetwork {
        &self.online
    }

    pub fn target(&self) -> &QNetwork {
        &self.target
    }

    pub fn memory_len(&self) -> usize {
        self.memory.len()
    }

    fn accepts(&self, state: &Array1<f64>) -> bool {
        if state.len() != self.state_size {
            warn!(
                expected = self.state_size,
                actual = state.len(),
                "State width does not match network input"
            );
            return false;
        }
        true
    }
}

impl Agent for DqnAgent {
    fn act(&mut self, state: &Array1<f64>) -> usize {
        if self.exploration.explore(&mut self.rng) {
            return self.rng.gen_range(0..self.action_size);
        }
        self.greedy_action(state)
    }

    fn greedy_action(&self, state: &Array1<f64>) -> usize {
        if !self.accepts(state) {
            return 0;
        }
        argmax(self.online.predict(state).iter())
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

        let mut total_loss = 0.0;
        for transition in &batch {
            if !self.accepts(&transition.state) || !self.accepts(&transition.next_state) {
                continue;
            }
            let mut target = self.online.predict(&transition.state);
            target[transition.action] = if transition.done {
                transition.reward
            } else {
                let next = self.target.predict(&transition.next_state);
                transition.reward + self.gamma * next.fold(f64::NEG_INFINITY, |m, &v| m.max(v))
            };
            total_loss += self.online.fit(&transition.state, &target);
        }

        self.exploration.decay();
        debug!(
            epsilon = self.exploration.epsilon(),
            mean_loss = total_loss / batch.len() as f64,
            "DQN replay complete"
        );
    }

    fn epsilon(&self) -> f64 {
        self.exploration.epsilon()
    }

    fn action_space_size(&self) -> usize {
        self.action_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr1;
    use rand::SeedableRng;

    fn config() -> RlConfig {
        RlConfig {
            epsilon: 0.0,
            epsilon_min: 0.0,
            learning_rate: 0.01,
            hidden_units: 8,
            seed: Some(5),
            ..Default::default()
        }
    }

    #[test]
    fn test_network_shapes() {
        let mut rng = StdRng::seed_from_u64(1);
        let net = QNetwork::new(4, 8, 3, 0.01, &mut rng);
        assert_eq!(net.input_size(), 4);
        assert_eq!(net.output_size(), 3);
        assert_eq!(net.predict(&arr1(&[0.1, 0.2, 0.3, 0.4])).len(), 3);
    }

    #[test]
    fn test_fit_reduces_loss() {
        let mut rng = StdRng::seed_from_u64(2);
        let mut net = QNetwork::new(3, 16, 2, 0.01, &mut rng);
        let state = arr1(&[0.5, -0.2, 0.9]);
        let target = arr1(&[1.0, -1.0]);
        let first = net.fit(&state, &target);
        for _ in 0..300 {
            net.fit(&state, &target);
        }
        let last = net.fit(&state, &target);
        assert!(last < first);
    }

    #[test]
    fn test_target_changes_only_on_sync() {
        let mut agent = DqnAgent::new(3, 4, &config());
        let state = arr1(&[0.1, 0.2, 0.3]);
        for _ in 0..4 {
            agent.remember(Transition {
                state: state.clone(),
                action: 1,
                reward: 2.0,
                next_state: Array1::zeros(3),
                done: true,
            });
        }
        let before = agent.target().predict(&state);
        agent.replay(4);
        assert_eq!(agent.target().predict(&state), before);
        assert_ne!(agent.online().predict(&state), before);

        agent.sync();
        assert_eq!(agent.target().predict(&state), agent.online().predict(&state));
    }

    #[test]
    fn test_seeded_agents_match() {
        let a = DqnAgent::new(5, 10, &config());
        let b = DqnAgent::new(5, 10, &config());
        let state = arr1(&[0.3, 0.1, -0.4, 0.2, 0.9]);
        assert_eq!(a.online().predict(&state), b.online().predict(&state));
        assert_eq!(a.greedy_action(&state), b.greedy_action(&state));
    }

    #[test]
    fn test_out_of_range_action_is_not_stored() {
        let mut agent = DqnAgent::new(1, 10, &config());
        let state = arr1(&[0.4]);
        agent.remember(Transition {
            state: state.clone(),
            action: 10,
            reward: 1.0,
            next_state: Array1::zeros(1),
            done: true,
        });
        assert_eq!(agent.memory_len(), 0);

        let before = agent.online().predict(&state);
        agent.replay(1);
        assert_eq!(agent.online().predict(&state), before);
    }

    #[test]
    fn test_wrong_state_width_falls_back_to_first_action() {
        let agent = DqnAgent::new(3, 4, &config());
        assert_eq!(agent.greedy_action(&arr1(&[1.0])), 0);
    }
}
