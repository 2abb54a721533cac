//! Episode loop that trains a threshold agent against the environment.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::agent::{Agent, AgentKind, TrainedAgent};
use super::dqn::DqnAgent;
use super::environment::PredictionEnvironment;
use super::q_learning::QLearningAgent;
use super::replay::Transition;
use crate::config::RlConfig;
use crate::domain::Domain;
use crate::error::EnvResult;

/// Episodes between progress log lines.
const LOG_INTERVAL: usize = 100;

/// Identifier for one training run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of a finished training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub run_id: RunId,
    pub domain: Domain,
    pub agent_kind: AgentKind,
    pub episodes: usize,
    pub best_average_reward: f64,
    pub final_average_reward: f64,
    pub final_epsilon: f64,
    /// Mean step reward of each episode, in order
    pub episode_rewards: Vec<f64>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// A trained agent with its report.
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub agent: TrainedAgent,
    pub report: TrainingReport,
}

/// Tabular agent for narrow inputs, DQN otherwise.
pub fn select_agent(state_size: usize, action_size: usize, config: &RlConfig) -> TrainedAgent {
    if state_size <= config.tabular_max_features {
        TrainedAgent::Tabular(QLearningAgent::new(state_size, action_size, config))
    } else {
        TrainedAgent::Deep(DqnAgent::new(state_size, action_size, config))
    }
}

/// Run `config.episodes` episodes of act, step and remember, replaying once
/// at the end of every episode.
///
/// An episode ends when the environment reports `done` or after one full
/// pass over the dataset. The DQN target network is synced every
/// `config.target_sync_episodes` episodes.
pub fn train(
    env: &mut PredictionEnvironment,
    mut agent: TrainedAgent,
    domain: Domain,
    config: &RlConfig,
) -> EnvResult<TrainingOutcome> {
    let run_id = RunId::new();
    let started_at = Utc::now();
    let max_steps = env.max_steps();

    info!(
        run_id = %run_id,
        domain = %domain,
        agent = %agent.kind(),
        episodes = config.episodes,
        samples = max_steps,
        "Starting RL training"
    );

    let mut episode_rewards = Vec::with_capacity(config.episodes);
    let mut best_average_reward = f64::NEG_INFINITY;

    for episode in 0..config.episodes {
        let mut state = env.reset()?;
        let mut total_reward = 0.0;
        let mut steps = 0;

        loop {
            let action = agent.act(&state);
            let step = env.step(action)?;
            agent.remember(Transition {
                state,
                action,
                reward: step.reward,
                next_state: step.next_state.clone(),
                done: step.done,
            });

            state = step.next_state;
            total_reward += step.reward;
            steps += 1;

            if step.done || steps >= max_steps {
                break;
            }
        }

        agent.replay(config.batch_size);

        if let TrainedAgent::Deep(dqn) = &mut agent {
            if config.target_sync_episodes > 0 && (episode + 1) % config.target_sync_episodes == 0 {
                dqn.sync();
            }
        }

        let average_reward = if steps > 0 {
            total_reward / steps as f64
        } else {
            0.0
        };
        if episode % LOG_INTERVAL == 0 {
            info!(
                run_id = %run_id,
                episode,
                average_reward = average_reward,
                epsilon = agent.epsilon(),
                "Training progress"
            );
        }
        best_average_reward = best_average_reward.max(average_reward);
        episode_rewards.push(average_reward);
    }

    let report = TrainingReport {
        run_id,
        domain,
        agent_kind: agent.kind(),
        episodes: config.episodes,
        best_average_reward,
        final_average_reward: episode_rewards.last().copied().unwrap_or(0.0),
        final_epsilon: agent.epsilon(),
        episode_rewards,
        started_at,
        finished_at: Utc::now(),
    };

    info!(
        run_id = %run_id,
        domain = %domain,
        best_average_reward = report.best_average_reward,
        "RL training completed"
    );

    Ok(TrainingOutcome { agent, report })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_selection_boundary() {
        let config = RlConfig {
            hidden_units: 4,
            ..Default::default()
        };
        assert_eq!(select_agent(20, 10, &config).kind(), AgentKind::Tabular);
        assert_eq!(select_agent(21, 10, &config).kind(), AgentKind::Deep);
    }

    #[test]
    fn test_run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }
}
