use std::env;
use std::str::FromStr;

use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub rl: RlConfig,
    pub adaptive: AdaptiveConfig,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Reinforcement learning hyperparameters shared by both agents.
#[derive(Debug, Clone, PartialEq)]
pub struct RlConfig {
    /// Q-table step size, and Adam learning rate for the DQN
    pub learning_rate: f64,
    /// Discount factor
    pub gamma: f64,
    /// Initial exploration rate
    pub epsilon: f64,
    /// Multiplicative decay applied after each replay
    pub epsilon_decay: f64,
    /// Exploration floor
    pub epsilon_min: f64,
    /// Replay memory capacity
    pub memory_size: usize,
    /// Transitions sampled per replay
    pub batch_size: usize,
    /// Training episodes
    pub episodes: usize,
    /// Number of discrete thresholds the agent chooses from
    pub action_space_size: usize,
    /// Largest feature count handled by the tabular agent
    pub tabular_max_features: usize,
    /// Episodes between target network syncs (0 disables)
    pub target_sync_episodes: usize,
    /// Width of both DQN hidden layers
    pub hidden_units: usize,
    /// Seed for reproducible runs
    pub seed: Option<u64>,
}

impl Default for RlConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.01,
            gamma: 0.95,
            epsilon: 1.0,
            epsilon_decay: 0.995,
            epsilon_min: 0.01,
            memory_size: 2000,
            batch_size: 32,
            episodes: 1000,
            action_space_size: 10,
            tabular_max_features: 20,
            target_sync_episodes: 10,
            hidden_units: 24,
            seed: None,
        }
    }
}

impl RlConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            learning_rate: env_or("RL_LEARNING_RATE", defaults.learning_rate),
            gamma: env_or("RL_GAMMA", defaults.gamma),
            epsilon: env_or("RL_EPSILON", defaults.epsilon),
            epsilon_decay: env_or("RL_EPSILON_DECAY", defaults.epsilon_decay),
            epsilon_min: env_or("RL_EPSILON_MIN", defaults.epsilon_min),
            memory_size: env_or("RL_MEMORY_SIZE", defaults.memory_size),
            batch_size: env_or("RL_BATCH_SIZE", defaults.batch_size),
            episodes: env_or("RL_EPISODES", defaults.episodes),
            action_space_size: env_or("RL_ACTION_SPACE_SIZE", defaults.action_space_size),
            tabular_max_features: env_or("RL_TABULAR_MAX_FEATURES", defaults.tabular_max_features),
            target_sync_episodes: env_or("RL_TARGET_SYNC_EPISODES", defaults.target_sync_episodes),
            hidden_units: env_or("RL_HIDDEN_UNITS", defaults.hidden_units),
            seed: env::var("RL_SEED").ok().and_then(|s| s.parse().ok()),
        }
    }

    /// Check that the hyperparameters describe a usable agent.
    pub fn validate(&self) -> Result<(), AppError> {
        let invalid = |message: &str| {
            Err(AppError::Config {
                message: message.to_string(),
            })
        };
        if !(0.0..=1.0).contains(&self.gamma) {
            return invalid("RL_GAMMA must be within [0, 1]");
        }
        if !(self.epsilon_decay > 0.0 && self.epsilon_decay <= 1.0) {
            return invalid("RL_EPSILON_DECAY must be within (0, 1]");
        }
        if self.epsilon_min < 0.0 || self.epsilon_min > self.epsilon || self.epsilon > 1.0 {
            return invalid("RL_EPSILON_MIN must not exceed RL_EPSILON, both within [0, 1]");
        }
        if self.learning_rate <= 0.0 {
            return invalid("RL_LEARNING_RATE must be positive");
        }
        if self.action_space_size == 0 {
            return invalid("RL_ACTION_SPACE_SIZE must be at least 1");
        }
        if self.batch_size == 0 || self.memory_size == 0 {
            return invalid("RL_BATCH_SIZE and RL_MEMORY_SIZE must be at least 1");
        }
        if self.hidden_units == 0 {
            return invalid("RL_HIDDEN_UNITS must be at least 1");
        }
        Ok(())
    }
}

/// Tuning for the adaptive reward system.
#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveConfig {
    /// History entries required before weights adapt
    pub min_history: usize,
    /// Mean recent reward below which recall is favoured
    pub poor_reward_threshold: f64,
    /// Non-improving evaluations tolerated before rebalancing
    pub stagnation_limit: u32,
    /// History length that triggers trimming
    pub history_capacity: usize,
    /// Entries kept after trimming
    pub history_retain: usize,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            min_history: 10,
            poor_reward_threshold: 0.5,
            stagnation_limit: 5,
            history_capacity: 100,
            history_retain: 50,
        }
    }
}

impl AdaptiveConfig {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            min_history: env_or("ADAPTIVE_MIN_HISTORY", defaults.min_history),
            poor_reward_threshold: env_or(
                "ADAPTIVE_POOR_REWARD_THRESHOLD",
                defaults.poor_reward_threshold,
            ),
            stagnation_limit: env_or("ADAPTIVE_STAGNATION_LIMIT", defaults.stagnation_limit),
            history_capacity: env_or("ADAPTIVE_HISTORY_CAPACITY", defaults.history_capacity),
            history_retain: env_or("ADAPTIVE_HISTORY_RETAIN", defaults.history_retain),
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.history_retain > self.history_capacity {
            return Err(AppError::Config {
                message: "ADAPTIVE_HISTORY_RETAIN must not exceed ADAPTIVE_HISTORY_CAPACITY"
                    .to_string(),
            });
        }
        if self.min_history == 0 {
            return Err(AppError::Config {
                message: "ADAPTIVE_MIN_HISTORY must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let rl = RlConfig::from_env();
        rl.validate()?;

        let adaptive = AdaptiveConfig::from_env();
        adaptive.validate()?;

        Ok(Config {
            logging,
            rl,
            adaptive,
        })
    }
}

/// Parse an environment variable, falling back to `default` when it is
/// missing or unparseable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
