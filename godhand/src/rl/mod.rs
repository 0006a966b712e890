//! Learned enemy steering.
//!
//! Provides:
//! - `agent`: tabular Q-learning over discretized enemy state
//! - `enemy`: enemy movement and the damage / death / objective transitions
//! - `storage`: key-value model persistence and the saved layout

pub mod agent;
pub mod enemy;
pub mod storage;

pub use agent::{
    Action, ActionValues, AgentConfig, AgentStats, Movement, QLearningAgent, RewardEvent,
    StateFeatures, StateKey, WorldView,
};
pub use enemy::{Enemy, EnemyPilot, Hit, PilotConfig, TickOutcome};
pub use storage::{FileStore, MemoryStore, ModelStore, PersistedModel, SCHEMA_VERSION};
