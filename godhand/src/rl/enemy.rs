//! Enemy movement and the learning transitions around it.
//!
//! `EnemyPilot` owns the agent and drives every enemy once per tick.
//! Learned enemies run the encode / learn / choose / move cycle; the rest
//! walk straight at the objective.  Damage, death and reaching the
//! objective feed their rewards back as extra transitions.

use tracing::debug;

use super::agent::{Action, QLearningAgent, RewardEvent, StateKey, WorldView};
use crate::geometry::Point2;

// ── Enemy ──────────────────────────────────────────────────

/// One enemy, reduced to what movement and learning need.
#[derive(Debug, Clone, PartialEq)]
pub struct Enemy {
    pub id: u32,
    pub position: Point2,
    /// Base speed in arena units per second.
    pub speed: f64,
    pub hp: f64,
    pub max_hp: f64,
    /// Body radius used for hit tests.
    pub size: f64,
    pub alive: bool,
    pub slow_factor: f64,
    /// Seconds until `slow_factor` resets to 1.
    pub slow_timer: f64,
    /// Seconds the enemy stays frozen.
    pub stun_timer: f64,
    pub is_rl_controlled: bool,
    /// Last (state, action) pair, awaiting its reward.
    pub rl_state: Option<StateKey>,
    pub rl_action: Option<Action>,
    /// Distance to the objective at the last reward computation.
    pub prev_distance: Option<f64>,
}

impl Enemy {
    /// A plain enemy that walks straight at the objective.
    pub fn new(id: u32, position: Point2, speed: f64, hp: f64) -> Self {
        Self {
            id,
            position,
            speed,
            hp,
            max_hp: hp,
            size: 30.0,
            alive: true,
            slow_factor: 1.0,
            slow_timer: 0.0,
            stun_timer: 0.0,
            is_rl_controlled: false,
            rl_state: None,
            rl_action: None,
            prev_distance: None,
        }
    }

    /// The learned boss.
    pub fn rl_boss(id: u32, position: Point2) -> Self {
        Self {
            size: 45.0,
            is_rl_controlled: true,
            ..Self::new(id, position, 40.0, 150.0)
        }
    }

    /// Slow to `factor` of base speed for `secs` seconds.
    pub fn slow(&mut self, factor: f64, secs: f64) {
        self.slow_factor = factor;
        self.slow_timer = secs;
    }

    /// The (state, action) pair awaiting a reward, if any.
    fn pending(&self) -> Option<(StateKey, Action)> {
        if !self.is_rl_controlled {
            return None;
        }
        self.rl_state.zip(self.rl_action)
    }
}

// ── Pilot ──────────────────────────────────────────────────

/// Arena and combat constants.
#[derive(Debug, Clone)]
pub struct PilotConfig {
    pub arena_width: f64,
    pub arena_height: f64,
    /// Reaching this close to the objective counts as an attack on it.
    pub attack_radius: f64,
    /// A hand hits an enemy within `size * hit_radius_factor`.
    pub hit_radius_factor: f64,
    pub base_damage: f64,
    /// Hand speed (px/s) per extra point of damage.
    pub speed_damage_divisor: f64,
    pub knockback: f64,
    pub stun_secs: f64,
}

impl Default for PilotConfig {
    fn default() -> Self {
        Self {
            arena_width: 1280.0,
            arena_height: 720.0,
            attack_radius: 50.0,
            hit_radius_factor: 1.5,
            base_damage: 20.0,
            speed_damage_divisor: 20.0,
            knockback: 30.0,
            stun_secs: 0.3,
        }
    }
}

/// What happened to an enemy during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Moved,
    Stunned,
    ReachedObjective,
    /// Already dead; nothing was done.
    Dead,
}

/// Result of a hand strike that connected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub enemy_id: u32,
    pub damage: f64,
    pub killed: bool,
}

pub struct EnemyPilot {
    config: PilotConfig,
    agent: QLearningAgent,
}

impl EnemyPilot {
    pub fn new(config: PilotConfig, agent: QLearningAgent) -> Self {
        Self { config, agent }
    }

    pub fn agent(&self) -> &QLearningAgent {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut QLearningAgent {
        &mut self.agent
    }

    pub fn config(&self) -> &PilotConfig {
        &self.config
    }

    pub fn into_agent(self) -> QLearningAgent {
        self.agent
    }

    /// Advance one enemy by `dt` seconds.
    pub fn tick(&mut self, enemy: &mut Enemy, world: &WorldView, dt: f64) -> TickOutcome {
        if !enemy.alive {
            return TickOutcome::Dead;
        }

        if enemy.slow_timer > 0.0 {
            enemy.slow_timer -= dt;
        } else {
            enemy.slow_factor = 1.0;
        }

        if enemy.stun_timer > 0.0 {
            enemy.stun_timer -= dt;
            return TickOutcome::Stunned;
        }

        if enemy.is_rl_controlled {
            self.steer(enemy, world, dt);
        } else {
            let angle = enemy.position.bearing_to(&world.objective);
            let step = enemy.speed * enemy.slow_factor * dt;
            enemy.position.x += angle.cos() * step;
            enemy.position.y += angle.sin() * step;
        }

        if enemy.position.distance(&world.objective) < self.config.attack_radius {
            self.reach_objective(enemy, world);
            return TickOutcome::ReachedObjective;
        }
        TickOutcome::Moved
    }

    /// Learn from the previous step, choose the next action and move.
    fn steer(&mut self, enemy: &mut Enemy, world: &WorldView, dt: f64) {
        let state = self.agent.encode_state(enemy, world);

        if let Some((prev_state, prev_action)) = enemy.pending() {
            let reward = self.agent.calculate_reward(enemy, world, None);
            self.agent
                .learn(prev_state, prev_action, reward, state, false);
        }

        let action = self.agent.choose_action(state);
        enemy.rl_state = Some(state);
        enemy.rl_action = Some(action);

        // The direction already carries the multiplier; the step applies it
        // again.
        let movement = self.agent.movement_for(action, enemy, world);
        let step = enemy.speed * enemy.slow_factor * movement.speed_multiplier * dt;
        enemy.position.x += movement.dx * step;
        enemy.position.y += movement.dy * step;

        enemy.position.x = enemy.position.x.clamp(0.0, self.config.arena_width);
        enemy.position.y = enemy.position.y.clamp(0.0, self.config.arena_height);
    }

    /// Apply damage.  Returns whether the enemy died from it.
    pub fn on_damaged(&mut self, enemy: &mut Enemy, world: &WorldView, damage: f64) -> bool {
        if !enemy.alive {
            return false;
        }
        enemy.hp -= damage;

        if let Some((state, action)) = enemy.pending() {
            let reward = self
                .agent
                .calculate_reward(enemy, world, Some(RewardEvent::Damaged));
            let next = self.agent.encode_state(enemy, world);
            self.agent.learn(state, action, reward, next, false);
        }

        if enemy.hp <= 0.0 {
            self.kill(enemy, world);
            return true;
        }
        false
    }

    /// Kill the enemy, closing its episode if it was learning.
    pub fn kill(&mut self, enemy: &mut Enemy, world: &WorldView) {
        if !enemy.alive {
            return;
        }
        self.close_episode(enemy, world, RewardEvent::Killed);
        enemy.alive = false;
        debug!("enemy {} killed", enemy.id);
    }

    /// The enemy hit the objective and is consumed by it.
    pub fn reach_objective(&mut self, enemy: &mut Enemy, world: &WorldView) {
        if !enemy.alive {
            return;
        }
        self.close_episode(enemy, world, RewardEvent::ReachedObjective);
        enemy.alive = false;
        debug!("enemy {} reached the objective", enemy.id);
    }

    fn close_episode(&mut self, enemy: &mut Enemy, world: &WorldView, event: RewardEvent) {
        let Some((state, action)) = enemy.pending() else {
            return;
        };
        let reward = self.agent.calculate_reward(enemy, world, Some(event));
        self.agent.learn(state, action, reward, state, true);
        self.agent.end_episode(reward);
    }

    /// Strike at `point` with a hand moving at `speed` px/s.  The first live
    /// enemy within reach takes damage, is knocked back and stunned.
    pub fn hand_attack(
        &mut self,
        enemies: &mut [Enemy],
        world: &WorldView,
        point: Point2,
        speed: f64,
    ) -> Option<Hit> {
        let enemy = enemies.iter_mut().find(|e| {
            e.alive && point.distance(&e.position) <= e.size * self.config.hit_radius_factor
        })?;

        let damage = self.config.base_damage + speed / self.config.speed_damage_divisor;
        let killed = self.on_damaged(enemy, world, damage);

        let angle = point.bearing_to(&enemy.position);
        enemy.position.x += angle.cos() * self.config.knockback;
        enemy.position.y += angle.sin() * self.config.knockback;
        enemy.stun_timer = self.config.stun_secs;

        debug!(
            "hand hit enemy {} for {:.1}{}",
            enemy.id,
            damage,
            if killed { " (killed)" } else { "" }
        );
        Some(Hit {
            enemy_id: enemy.id,
            damage,
            killed,
        })
    }
}
