//! Tabular Q-learning for enemy steering.
//!
//! The agent discretizes an enemy's situation (distance and bearing to the
//! objective, nearby hands) into a `StateKey`, picks one of five steering
//! actions epsilon-greedily, and updates its table online with the one-step
//! Q-learning rule.  The table and training statistics persist through a
//! `ModelStore` under a single key.

use std::collections::{HashMap, HashSet, VecDeque};
use std::f64::consts::{FRAC_PI_4, PI};
use std::fmt;
use std::str::FromStr;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::enemy::Enemy;
use super::storage::{ModelStore, PersistedModel, SCHEMA_VERSION};
use crate::geometry::Point2;
use crate::tracking::{GestureClassifier, HandSlot};

// ── Actions ────────────────────────────────────────────────

/// Steering choices relative to the straight line to the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Direct,
    Left,
    Right,
    Retreat,
    Charge,
}

impl Action {
    /// Fixed iteration order; ties in the table resolve to the earliest.
    pub const ALL: [Action; 5] = [
        Action::Direct,
        Action::Left,
        Action::Right,
        Action::Retreat,
        Action::Charge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Left => "left",
            Self::Right => "right",
            Self::Retreat => "retreat",
            Self::Charge => "charge",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.as_str() == s)
    }

    /// Offset added to the bearing towards the objective, in radians.
    pub fn bearing_offset(&self) -> f64 {
        match self {
            Self::Direct | Self::Charge => 0.0,
            Self::Left => -FRAC_PI_4,
            Self::Right => FRAC_PI_4,
            Self::Retreat => PI,
        }
    }

    pub fn speed_multiplier(&self) -> f64 {
        match self {
            Self::Retreat => 0.8,
            Self::Charge => 1.8,
            _ => 1.0,
        }
    }
}

/// One table row: an estimate per action.
///
/// Missing actions in a persisted row default to zero.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ActionValues {
    #[serde(default)]
    pub direct: f64,
    #[serde(default)]
    pub left: f64,
    #[serde(default)]
    pub right: f64,
    #[serde(default)]
    pub retreat: f64,
    #[serde(default)]
    pub charge: f64,
}

impl ActionValues {
    pub fn get(&self, action: Action) -> f64 {
        match action {
            Action::Direct => self.direct,
            Action::Left => self.left,
            Action::Right => self.right,
            Action::Retreat => self.retreat,
            Action::Charge => self.charge,
        }
    }

    pub fn set(&mut self, action: Action, value: f64) {
        match action {
            Action::Direct => self.direct = value,
            Action::Left => self.left = value,
            Action::Right => self.right = value,
            Action::Retreat => self.retreat = value,
            Action::Charge => self.charge = value,
        }
    }

    /// Highest estimate in the row.
    pub fn max(&self) -> f64 {
        Action::ALL
            .iter()
            .map(|a| self.get(*a))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Action with the highest estimate; the first in `Action::ALL` wins ties.
    pub fn best(&self) -> Action {
        let mut best = Action::ALL[0];
        let mut best_value = f64::NEG_INFINITY;
        for action in Action::ALL {
            let v = self.get(action);
            if v > best_value {
                best_value = v;
                best = action;
            }
        }
        best
    }
}

// ── State encoding ─────────────────────────────────────────

/// Discretized features of an enemy's situation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateFeatures {
    /// 0 = near, 1 = mid, 2 = far from the objective.
    pub distance_level: u8,
    /// Compass bucket 0..4 of the bearing to the objective.
    pub direction: u8,
    pub left_hand_near: bool,
    pub right_hand_near: bool,
    pub left_hand_exists: bool,
    pub right_hand_exists: bool,
}

/// Table row index: `StateFeatures` packed into one byte.
///
/// Bits 0-1 distance level, 2-3 direction, 4 left hand near, 5 right hand
/// near, 6 left hand exists, 7 right hand exists.  The text form
/// `d_dir_ln_rn_le_re` is used for persistence and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(u8);

impl StateKey {
    pub fn from_features(f: StateFeatures) -> Self {
        let mut bits = (f.distance_level & 0b11) | ((f.direction & 0b11) << 2);
        if f.left_hand_near {
            bits |= 1 << 4;
        }
        if f.right_hand_near {
            bits |= 1 << 5;
        }
        if f.left_hand_exists {
            bits |= 1 << 6;
        }
        if f.right_hand_exists {
            bits |= 1 << 7;
        }
        Self(bits)
    }

    pub fn features(&self) -> StateFeatures {
        StateFeatures {
            distance_level: self.0 & 0b11,
            direction: (self.0 >> 2) & 0b11,
            left_hand_near: self.0 & (1 << 4) != 0,
            right_hand_near: self.0 & (1 << 5) != 0,
            left_hand_exists: self.0 & (1 << 6) != 0,
            right_hand_exists: self.0 & (1 << 7) != 0,
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.features();
        write!(
            f,
            "{}_{}_{}_{}_{}_{}",
            s.distance_level,
            s.direction,
            u8::from(s.left_hand_near),
            u8::from(s.right_hand_near),
            u8::from(s.left_hand_exists),
            u8::from(s.right_hand_exists),
        )
    }
}

/// Parse failure for a textual state key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseStateKeyError(String);

impl fmt::Display for ParseStateKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid state key: {:?}", self.0)
    }
}

impl std::error::Error for ParseStateKeyError {}

impl FromStr for StateKey {
    type Err = ParseStateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseStateKeyError(s.to_string());
        let fields: Vec<u8> = s
            .split('_')
            .map(|p| p.parse::<u8>())
            .collect::<Result<_, _>>()
            .map_err(|_| err())?;
        let [d, dir, ln, rn, le, re] = fields[..] else {
            return Err(err());
        };
        if d > 2 || dir > 3 || [ln, rn, le, re].iter().any(|b| *b > 1) {
            return Err(err());
        }
        Ok(Self::from_features(StateFeatures {
            distance_level: d,
            direction: dir,
            left_hand_near: ln == 1,
            right_hand_near: rn == 1,
            left_hand_exists: le == 1,
            right_hand_exists: re == 1,
        }))
    }
}

/// Compass bucket of a bearing, offset by half a bucket so bucket edges
/// fall between the axes.
pub fn direction_bucket(bearing: f64) -> u8 {
    (((bearing + PI) / (2.0 * PI) * 4.0 + 0.5) % 4.0).floor() as u8
}

// ── World view ─────────────────────────────────────────────

/// What the agent can observe besides the enemy itself.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WorldView {
    /// Objective (crystal) position in arena units.
    pub objective: Point2,
    /// Palm centers of the tracked hands, if any.
    pub left_hand: Option<Point2>,
    pub right_hand: Option<Point2>,
}

impl WorldView {
    pub fn new(objective: Point2) -> Self {
        Self {
            objective,
            ..Default::default()
        }
    }

    /// Build from the classifier's tracked hands.  Each side takes the first
    /// present slot among solo, player one and player two.
    pub fn from_classifier(objective: Point2, classifier: &GestureClassifier) -> Self {
        let first = |slots: [HandSlot; 3]| {
            slots
                .iter()
                .find_map(|s| classifier.hand_snapshot(*s).map(|h| h.palm_center))
        };
        Self {
            objective,
            left_hand: first([HandSlot::Left, HandSlot::P1Left, HandSlot::P2Left]),
            right_hand: first([HandSlot::Right, HandSlot::P1Right, HandSlot::P2Right]),
        }
    }
}

// ── Rewards and movement ───────────────────────────────────

/// One-shot events that carry a reward on top of the shaping terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewardEvent {
    /// The enemy damaged the objective.
    ReachedObjective,
    Damaged,
    Killed,
}

impl RewardEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReachedObjective => "attack-crystal",
            Self::Damaged => "damaged",
            Self::Killed => "killed",
        }
    }
}

/// Direction scaled by the action's speed multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    pub dx: f64,
    pub dy: f64,
    pub speed_multiplier: f64,
}

// ── Configuration ──────────────────────────────────────────

/// Learning hyperparameters and discretization thresholds.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// α
    pub learning_rate: f64,
    /// γ
    pub discount: f64,
    /// Initial exploration rate, also restored by `reset_model`.
    pub epsilon: f64,
    pub epsilon_decay: f64,
    pub epsilon_min: f64,
    /// Near/mid and mid/far objective distance boundaries.
    pub objective_thresholds: [f64; 2],
    /// A hand closer than this to the enemy counts as near.
    pub hand_threshold: f64,
    /// Persist every N completed episodes.
    pub save_every: u64,
    pub reward_history_len: usize,
    pub storage_key: String,
    pub reached_objective_reward: f64,
    pub damaged_reward: f64,
    pub killed_reward: f64,
    pub approach_reward: f64,
    pub survival_reward: f64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.1,
            discount: 0.95,
            epsilon: 0.3,
            epsilon_decay: 0.995,
            epsilon_min: 0.05,
            objective_thresholds: [150.0, 350.0],
            hand_threshold: 120.0,
            save_every: 10,
            reward_history_len: 100,
            storage_key: "rl_agent_model".to_string(),
            reached_objective_reward: 100.0,
            damaged_reward: -20.0,
            killed_reward: -50.0,
            approach_reward: 0.5,
            survival_reward: 0.1,
        }
    }
}

// ── Agent ──────────────────────────────────────────────────

/// Training statistics.
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    pub episodes: u64,
    pub total_reward: f64,
    pub reward_history: VecDeque<f64>,
    /// Keys encoded this session.  Diagnostic only, not persisted.
    pub states_visited: HashSet<StateKey>,
}

impl AgentStats {
    pub fn average_reward(&self) -> Option<f64> {
        if self.reward_history.is_empty() {
            return None;
        }
        Some(self.reward_history.iter().sum::<f64>() / self.reward_history.len() as f64)
    }
}

pub struct QLearningAgent {
    config: AgentConfig,
    table: HashMap<StateKey, ActionValues>,
    epsilon: f64,
    stats: AgentStats,
    rng: StdRng,
    store: Box<dyn ModelStore>,
}

impl QLearningAgent {
    /// Create an agent seeded from OS entropy and restore any saved model.
    pub fn new(config: AgentConfig, store: Box<dyn ModelStore>) -> Self {
        Self::with_rng(config, store, StdRng::from_entropy())
    }

    /// Create an agent with a caller-supplied generator.
    pub fn with_rng(config: AgentConfig, store: Box<dyn ModelStore>, rng: StdRng) -> Self {
        let epsilon = config.epsilon;
        let mut agent = Self {
            config,
            table: HashMap::new(),
            epsilon,
            stats: AgentStats::default(),
            rng,
            store,
        };
        agent.load_model();
        agent
    }

    /// Deterministic agent for reproducible runs.
    pub fn seeded(config: AgentConfig, store: Box<dyn ModelStore>, seed: u64) -> Self {
        Self::with_rng(config, store, StdRng::seed_from_u64(seed))
    }

    /// Discretize the enemy's situation and record the key as visited.
    pub fn encode_state(&mut self, enemy: &Enemy, world: &WorldView) -> StateKey {
        let dist = enemy.position.distance(&world.objective);
        let [near, mid] = self.config.objective_thresholds;
        let distance_level = if dist < near {
            0
        } else if dist < mid {
            1
        } else {
            2
        };
        let direction = direction_bucket(enemy.position.bearing_to(&world.objective));

        let hand_near = |hand: Option<Point2>| {
            hand.map_or(false, |p| enemy.position.distance(&p) < self.config.hand_threshold)
        };
        let key = StateKey::from_features(StateFeatures {
            distance_level,
            direction,
            left_hand_near: hand_near(world.left_hand),
            right_hand_near: hand_near(world.right_hand),
            left_hand_exists: world.left_hand.is_some(),
            right_hand_exists: world.right_hand.is_some(),
        });
        self.stats.states_visited.insert(key);
        key
    }

    /// Epsilon-greedy choice.
    pub fn choose_action(&mut self, state: StateKey) -> Action {
        if self.rng.gen::<f64>() < self.epsilon {
            return Action::ALL[self.rng.gen_range(0..Action::ALL.len())];
        }
        self.best_action(state)
    }

    /// Greedy choice.  Unseen states are initialized to zeros.
    pub fn best_action(&mut self, state: StateKey) -> Action {
        self.row(state).best()
    }

    /// Current estimate, zero for unseen pairs.
    pub fn q_value(&self, state: StateKey, action: Action) -> f64 {
        self.table.get(&state).map_or(0.0, |row| row.get(action))
    }

    pub fn values(&self, state: StateKey) -> Option<&ActionValues> {
        self.table.get(&state)
    }

    fn row(&mut self, state: StateKey) -> &mut ActionValues {
        self.table.entry(state).or_default()
    }

    /// One-step Q-learning update.
    pub fn learn(
        &mut self,
        state: StateKey,
        action: Action,
        reward: f64,
        next_state: StateKey,
        done: bool,
    ) {
        let max_next = self.row(next_state).max();
        let target = if done {
            reward
        } else {
            reward + self.config.discount * max_next
        };
        let alpha = self.config.learning_rate;
        let row = self.row(state);
        let current = row.get(action);
        row.set(action, current + alpha * (target - current));
        self.stats.total_reward += reward;
    }

    /// Close an episode: record its final reward, decay exploration, and
    /// persist periodically.
    pub fn end_episode(&mut self, final_reward: f64) {
        self.stats.episodes += 1;
        self.stats.reward_history.push_back(final_reward);
        while self.stats.reward_history.len() > self.config.reward_history_len {
            self.stats.reward_history.pop_front();
        }
        self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        debug!(
            "RL: episode {} ended (reward {:.1}, epsilon {:.3})",
            self.stats.episodes, final_reward, self.epsilon
        );
        if self.config.save_every > 0 && self.stats.episodes % self.config.save_every == 0 {
            self.save_model();
        }
    }

    /// Event bonus, approach shaping and survival bonus.  Records the
    /// current distance on the enemy as the next shaping baseline.
    pub fn calculate_reward(
        &self,
        enemy: &mut Enemy,
        world: &WorldView,
        event: Option<RewardEvent>,
    ) -> f64 {
        let mut reward = match event {
            Some(RewardEvent::ReachedObjective) => self.config.reached_objective_reward,
            Some(RewardEvent::Damaged) => self.config.damaged_reward,
            Some(RewardEvent::Killed) => self.config.killed_reward,
            None => 0.0,
        };

        let dist = enemy.position.distance(&world.objective);
        if let Some(prev) = enemy.prev_distance {
            if dist < prev {
                reward += self.config.approach_reward;
            } else if dist > prev {
                reward -= self.config.approach_reward;
            }
        }
        enemy.prev_distance = Some(dist);

        reward + self.config.survival_reward
    }

    /// Direction for `action` relative to the bearing towards the objective.
    pub fn movement_for(&self, action: Action, enemy: &Enemy, world: &WorldView) -> Movement {
        let angle = enemy.position.bearing_to(&world.objective) + action.bearing_offset();
        let speed_multiplier = action.speed_multiplier();
        Movement {
            dx: angle.cos() * speed_multiplier,
            dy: angle.sin() * speed_multiplier,
            speed_multiplier,
        }
    }

    // ── Persistence ────────────────────────────────────────

    /// Snapshot of the persisted layout.
    pub fn to_persisted(&self) -> PersistedModel {
        PersistedModel {
            version: Some(SCHEMA_VERSION),
            q_table: self
                .table
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            epsilon: self.epsilon,
            episodes: self.stats.episodes,
            total_reward: self.stats.total_reward,
            reward_history: self.stats.reward_history.iter().copied().collect(),
        }
    }

    /// Write the model to the store.  Failures are logged and ignored.
    pub fn save_model(&mut self) {
        let result = self
            .to_persisted()
            .to_json()
            .and_then(|json| self.store.save(&self.config.storage_key, &json));
        match result {
            Ok(()) => info!("RL: model saved ({} states)", self.table.len()),
            Err(e) => warn!("RL: failed to save model: {:#}", e),
        }
    }

    /// Restore the model from the store.  Missing, unreadable or
    /// incompatible models leave the current state untouched.
    pub fn load_model(&mut self) {
        let model = match self.store.load(&self.config.storage_key) {
            Ok(Some(json)) => match PersistedModel::from_json(&json) {
                Ok(model) => model,
                Err(e) => {
                    warn!("RL: failed to load model: {:#}", e);
                    return;
                }
            },
            Ok(None) => return,
            Err(e) => {
                warn!("RL: failed to load model: {:#}", e);
                return;
            }
        };
        if !model.is_compatible() {
            warn!(
                "RL: ignoring saved model with schema version {:?} (expected {})",
                model.version, SCHEMA_VERSION
            );
            return;
        }

        let mut table = HashMap::with_capacity(model.q_table.len());
        for (key, row) in model.q_table {
            match key.parse::<StateKey>() {
                Ok(k) => {
                    table.insert(k, row);
                }
                Err(e) => warn!("RL: skipping saved row: {}", e),
            }
        }
        self.table = table;
        self.epsilon = model.epsilon;
        self.stats.episodes = model.episodes;
        self.stats.total_reward = model.total_reward;
        self.stats.reward_history = model.reward_history.into_iter().collect();
        while self.stats.reward_history.len() > self.config.reward_history_len {
            self.stats.reward_history.pop_front();
        }
        info!("RL: model loaded ({} states)", self.table.len());
    }

    /// Forget everything learned and remove the persisted model.
    pub fn reset_model(&mut self) {
        self.table.clear();
        self.epsilon = self.config.epsilon;
        self.stats = AgentStats::default();
        if let Err(e) = self.store.remove(&self.config.storage_key) {
            warn!("RL: failed to remove saved model: {:#}", e);
        }
        info!("RL: model reset");
    }

    // ── Accessors ──────────────────────────────────────────

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    pub fn state_count(&self) -> usize {
        self.table.len()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Generate s-expression describing one state's row and the training
    /// progress.
    pub fn debug_sexp(&self, state: StateKey) -> String {
        let row = self.table.get(&state).copied().unwrap_or_default();
        let q = Action::ALL
            .iter()
            .map(|a| format!(":{} {:.2}", a.as_str(), row.get(*a)))
            .collect::<Vec<_>>()
            .join(" ");
        let avg = self
            .stats
            .average_reward()
            .map_or_else(|| "nil".to_string(), |r| format!("{r:.2}"));
        format!(
            "(:state \"{}\" :q ({}) :best {} :epsilon {:.3} :episodes {} :states {} :avg-reward {})",
            state,
            q,
            row.best().as_str(),
            self.epsilon,
            self.stats.episodes,
            self.table.len(),
            avg,
        )
    }
}
