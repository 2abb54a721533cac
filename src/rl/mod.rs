//! Reinforcement learning over discrete decision thresholds.
//!
//! A [`PredictionEnvironment`] turns a labelled dataset and a frozen scorer
//! into a sequential decision process. Action `a` selects threshold
//! `(a + 1) / K`. Two interchangeable [`Agent`]s learn which threshold to
//! pick for a given scaled feature vector:
//!
//! | Agent | State representation | Used when |
//! |-------|----------------------|-----------|
//! | [`QLearningAgent`] | features rounded to one decimal | `features <= tabular_max_features` |
//! | [`DqnAgent`] | raw scaled features | wider inputs |

pub mod agent;
pub mod dqn;
pub mod environment;
pub mod q_learning;
pub mod replay;
pub mod trainer;

pub use agent::{Agent, AgentKind, Exploration, TrainedAgent};
pub use dqn::{DqnAgent, QNetwork};
pub use environment::{
    action_to_threshold, decide, is_correct, shaped_reward, Decision, LabeledDataset,
    PredictionEnvironment, Step, StepInfo,
};
pub use q_learning::{QLearningAgent, StateKey};
pub use replay::{ReplayMemory, Transition};
pub use trainer::{select_agent, train, RunId, TrainingOutcome, TrainingReport};
