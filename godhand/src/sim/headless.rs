//! Headless simulation: the full per-frame loop without a camera or screen.
//!
//! A scripted guard hand stands in for the landmark provider.  Each frame
//! runs provider output -> `HandTracker` -> `GestureClassifier` -> hand
//! strikes -> `EnemyPilot`, with time stepped by a `ManualClock`.  One
//! learned boss is spawned per episode; an episode ends when it dies,
//! reaches the objective, or times out.

use std::slice;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::clock::ManualClock;
use crate::geometry::Point2;
use crate::rl::{Enemy, EnemyPilot, PilotConfig, QLearningAgent, TickOutcome, WorldView};
use crate::tracking::synthetic::{center_for_palm, fist, open_hand, raw_hand};
use crate::tracking::{
    GestureClassifier, GestureConfig, GestureEvent, GestureType, HandTracker, Handedness,
    Landmarks, RawHand, TrackingConfig, TrackingMode,
};

/// Headless run configuration.
#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    /// Episodes to run.
    pub episodes: u32,
    /// Simulated frame length in milliseconds.
    pub frame_ms: u64,
    /// An episode with no outcome after this long is abandoned.
    pub max_episode_ms: u64,
    /// Arena (and viewport) width in pixels.
    pub width: f64,
    /// Arena (and viewport) height in pixels.
    pub height: f64,
    pub mode: TrackingMode,
    /// The guard hand engages enemies this close to the objective.
    pub guard_radius: f64,
    /// Guard hand travel speed in pixels per second.
    pub hand_speed: f64,
    /// Horizontal wobble, in pixels, while striking.
    pub swing: f64,
    /// Seed for spawn positions.
    pub seed: u64,
    /// Log a status line every N episodes.
    pub status_every: u32,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            episodes: 50,
            frame_ms: 33,
            max_episode_ms: 60_000,
            width: 1280.0,
            height: 720.0,
            mode: TrackingMode::Solo,
            guard_radius: 220.0,
            hand_speed: 400.0,
            swing: 15.0,
            seed: 0,
            status_every: 10,
        }
    }
}

impl HeadlessConfig {
    /// Parse a "WxH" resolution string. Returns (width, height) or None.
    pub fn parse_resolution(s: &str) -> Option<(f64, f64)> {
        let (w, h) = s.split_once('x')?;
        let w = w.parse::<u32>().ok()?;
        let h = h.parse::<u32>().ok()?;
        if w > 0 && h > 0 {
            Some((w as f64, h as f64))
        } else {
            None
        }
    }

    fn objective(&self) -> Point2 {
        Point2::new(self.width / 2.0, self.height / 2.0)
    }
}

// ── Scripted hands ─────────────────────────────────────────

/// A fist that waits beside the objective and swings at any enemy that
/// comes within the guard radius.
#[derive(Debug, Clone)]
pub struct GuardHand {
    rest: Point2,
    position: Point2,
    /// Alternates the wobble side each striking frame.
    phase: bool,
}

impl GuardHand {
    pub fn new(rest: Point2) -> Self {
        Self {
            rest,
            position: rest,
            phase: false,
        }
    }

    /// Advance by `dt` seconds towards `target` (or back to rest) and return
    /// the palm position for this frame.
    pub fn step(&mut self, target: Option<Point2>, speed: f64, swing: f64, dt: f64) -> Point2 {
        let goal = target.unwrap_or(self.rest);
        let dist = self.position.distance(&goal);
        let reach = speed * dt;
        if dist <= reach {
            self.position = goal;
        } else {
            let angle = self.position.bearing_to(&goal);
            self.position.x += angle.cos() * reach;
            self.position.y += angle.sin() * reach;
        }

        if target.is_none() {
            return self.position;
        }
        self.phase = !self.phase;
        let offset = if self.phase { swing } else { -swing };
        Point2::new(self.position.x + offset, self.position.y)
    }

    pub fn position(&self) -> Point2 {
        self.position
    }

    pub fn reset(&mut self) {
        self.position = self.rest;
        self.phase = false;
    }
}

// ── Reports ────────────────────────────────────────────────

/// How an episode ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodeOutcome {
    Killed,
    ReachedObjective,
    TimedOut,
}

impl EpisodeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Killed => "killed",
            Self::ReachedObjective => "reached-objective",
            Self::TimedOut => "timed-out",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeReport {
    pub outcome: EpisodeOutcome,
    pub duration_ms: u64,
    pub gestures: u32,
    pub hits: u32,
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulationReport {
    pub episodes: u32,
    pub kills: u32,
    pub breaches: u32,
    pub timeouts: u32,
    /// Fired gestures by kind: chop, punch, slap, clap.
    pub gestures: [u32; 4],
    pub hits: u32,
    pub states: usize,
    pub epsilon: f64,
    pub average_reward: Option<f64>,
}

impl SimulationReport {
    fn record(&mut self, episode: &EpisodeReport) {
        self.episodes += 1;
        self.hits += episode.hits;
        match episode.outcome {
            EpisodeOutcome::Killed => self.kills += 1,
            EpisodeOutcome::ReachedObjective => self.breaches += 1,
            EpisodeOutcome::TimedOut => self.timeouts += 1,
        }
    }

    /// Generate s-expression for status reporting.
    pub fn status_sexp(&self) -> String {
        format!(
            "(:episodes {} :kills {} :breaches {} :timeouts {} :hits {} :gestures (:chop {} :punch {} :slap {} :clap {}) :states {} :epsilon {:.3} :avg-reward {})",
            self.episodes,
            self.kills,
            self.breaches,
            self.timeouts,
            self.hits,
            self.gestures[0],
            self.gestures[1],
            self.gestures[2],
            self.gestures[3],
            self.states,
            self.epsilon,
            self.average_reward
                .map_or_else(|| "nil".to_string(), |r| format!("{r:.2}")),
        )
    }
}

fn gesture_index(kind: GestureType) -> usize {
    match kind {
        GestureType::Chop => 0,
        GestureType::Punch => 1,
        GestureType::Slap => 2,
        GestureType::Clap => 3,
    }
}

// ── Simulation ─────────────────────────────────────────────

pub struct Simulation {
    config: HeadlessConfig,
    clock: ManualClock,
    tracker: HandTracker,
    classifier: GestureClassifier,
    pilot: EnemyPilot,
    guard: GuardHand,
    rng: StdRng,
    next_enemy_id: u32,
    report: SimulationReport,
}

impl Simulation {
    pub fn new(config: HeadlessConfig, agent: QLearningAgent) -> Self {
        let clock = ManualClock::new(0);
        let tracker = HandTracker::new(TrackingConfig {
            mode: config.mode,
            viewport_width: config.width,
            viewport_height: config.height,
            ..Default::default()
        });
        let classifier =
            GestureClassifier::with_clock(GestureConfig::default(), Box::new(clock.clone()));
        let pilot = EnemyPilot::new(
            PilotConfig {
                arena_width: config.width,
                arena_height: config.height,
                ..Default::default()
            },
            agent,
        );
        let objective = config.objective();
        let guard = GuardHand::new(Point2::new(objective.x - 180.0, objective.y));
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            clock,
            tracker,
            classifier,
            pilot,
            guard,
            rng,
            next_enemy_id: 0,
            report: SimulationReport::default(),
        }
    }

    pub fn pilot(&self) -> &EnemyPilot {
        &self.pilot
    }

    pub fn pilot_mut(&mut self) -> &mut EnemyPilot {
        &mut self.pilot
    }

    pub fn into_agent(self) -> QLearningAgent {
        self.pilot.into_agent()
    }

    /// Run all configured episodes.
    pub fn run(&mut self) -> SimulationReport {
        info!(
            "Simulation: {} episode(s), {}ms frames, {}x{} arena, {} mode",
            self.config.episodes,
            self.config.frame_ms,
            self.config.width,
            self.config.height,
            self.config.mode.as_str(),
        );
        for n in 1..=self.config.episodes {
            let enemy = self.spawn();
            let episode = self.run_episode(enemy);
            debug!(
                "Simulation: episode {} {} after {}ms ({} hits)",
                n,
                episode.outcome.as_str(),
                episode.duration_ms,
                episode.hits
            );
            if self.config.status_every > 0 && n % self.config.status_every == 0 {
                let report = self.report();
                info!(
                    "Simulation: episode {}/{}: {}",
                    n,
                    self.config.episodes,
                    report.status_sexp()
                );
            }
        }
        self.report()
    }

    /// Totals so far, with the agent's current statistics.
    pub fn report(&self) -> SimulationReport {
        let agent = self.pilot.agent();
        SimulationReport {
            states: agent.state_count(),
            epsilon: agent.epsilon(),
            average_reward: agent.stats().average_reward(),
            ..self.report.clone()
        }
    }

    /// A learned boss on a random arena edge.
    pub fn spawn(&mut self) -> Enemy {
        self.next_enemy_id += 1;
        let (w, h) = (self.config.width, self.config.height);
        let position = match self.rng.gen_range(0..4) {
            0 => Point2::new(self.rng.gen_range(0.0..w), 0.0),
            1 => Point2::new(w, self.rng.gen_range(0.0..h)),
            2 => Point2::new(self.rng.gen_range(0.0..w), h),
            _ => Point2::new(0.0, self.rng.gen_range(0.0..h)),
        };
        Enemy::rl_boss(self.next_enemy_id, position)
    }

    /// Run frames until `enemy` dies, reaches the objective, or the episode
    /// times out.
    pub fn run_episode(&mut self, mut enemy: Enemy) -> EpisodeReport {
        let objective = self.config.objective();
        let dt = self.config.frame_ms as f64 / 1000.0;
        self.classifier.reset();
        self.guard.reset();

        let mut report = EpisodeReport {
            outcome: EpisodeOutcome::TimedOut,
            duration_ms: 0,
            gestures: 0,
            hits: 0,
        };

        while report.duration_ms < self.config.max_episode_ms {
            let raw = self.hand_frame(&enemy, objective, dt);
            let samples = self.tracker.map_frame(&raw);
            let events = self.classifier.process_frame(&samples);
            let world = WorldView::from_classifier(objective, &self.classifier);

            for event in &events {
                let GestureEvent::Gesture(g) = event else {
                    continue;
                };
                report.gestures += 1;
                self.report.gestures[gesture_index(g.kind)] += 1;
                let hit = self.pilot.hand_attack(
                    slice::from_mut(&mut enemy),
                    &world,
                    g.palm_center(),
                    g.velocity.speed,
                );
                if hit.is_some() {
                    report.hits += 1;
                }
            }

            if !enemy.alive {
                report.outcome = EpisodeOutcome::Killed;
                break;
            }
            match self.pilot.tick(&mut enemy, &world, dt) {
                TickOutcome::ReachedObjective => {
                    report.outcome = EpisodeOutcome::ReachedObjective;
                    break;
                }
                TickOutcome::Dead => {
                    report.outcome = EpisodeOutcome::Killed;
                    break;
                }
                TickOutcome::Moved | TickOutcome::Stunned => {}
            }

            self.clock.advance(self.config.frame_ms);
            report.duration_ms += self.config.frame_ms;
        }

        if report.outcome == EpisodeOutcome::TimedOut {
            debug!("Simulation: enemy {} despawned after timeout", enemy.id);
        }
        self.report.record(&report);
        report
    }

    /// Provider output for one frame: the guard fist plus an idle open
    /// right hand beside the objective.
    fn hand_frame(&mut self, enemy: &Enemy, objective: Point2, dt: f64) -> Vec<RawHand> {
        let target = (enemy.alive
            && enemy.position.distance(&objective) < self.config.guard_radius)
            .then_some(enemy.position);
        let guard = self
            .guard
            .step(target, self.config.hand_speed, self.config.swing, dt);
        let idle = Point2::new(objective.x + 180.0, objective.y);

        // The provider labels are mirrored: `Right` is the user's left hand.
        vec![
            raw_hand(self.pose_at(guard, fist), Handedness::Right),
            raw_hand(self.pose_at(idle, open_hand), Handedness::Left),
        ]
    }

    /// Build a pose whose screen palm center lands on `screen`.
    fn pose_at(&self, screen: Point2, pose: fn(f64, f64) -> Landmarks) -> Landmarks {
        let normalized = Point2::new(
            1.0 - screen.x / self.config.width,
            screen.y / self.config.height,
        );
        let (cx, cy) = center_for_palm(normalized);
        pose(cx, cy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::{AgentConfig, MemoryStore};

    fn make_sim(config: HeadlessConfig, store: &MemoryStore) -> Simulation {
        let agent = QLearningAgent::seeded(AgentConfig::default(), Box::new(store.clone()), 3);
        Simulation::new(config, agent)
    }

    #[test]
    fn test_parse_resolution() {
        assert_eq!(HeadlessConfig::parse_resolution("1280x720"), Some((1280.0, 720.0)));
        assert_eq!(HeadlessConfig::parse_resolution("0x720"), None);
        assert_eq!(HeadlessConfig::parse_resolution("1280"), None);
        assert_eq!(HeadlessConfig::parse_resolution("axb"), None);
    }

    #[test]
    fn test_guard_hand_returns_to_rest_and_chases() {
        let rest = Point2::new(460.0, 360.0);
        let mut guard = GuardHand::new(rest);
        assert_eq!(guard.step(None, 400.0, 15.0, 0.033), rest);

        let target = Point2::new(400.0, 300.0);
        for _ in 0..30 {
            guard.step(Some(target), 400.0, 15.0, 0.033);
        }
        assert_eq!(guard.position(), target);
        let a = guard.step(Some(target), 400.0, 15.0, 0.033);
        let b = guard.step(Some(target), 400.0, 15.0, 0.033);
        assert!((a.x - b.x).abs() > 29.0, "swing alternates sides");
    }

    #[test]
    fn test_pose_lands_on_screen_point() {
        let store = MemoryStore::new();
        let mut sim = make_sim(HeadlessConfig::default(), &store);
        let target = Point2::new(300.0, 200.0);
        let pose = sim.pose_at(target, fist);
        let samples = sim.tracker.map_frame(&[raw_hand(pose, Handedness::Right)]);
        assert_eq!(samples.len(), 1);
        assert!(samples[0].screen_palm_center().distance(&target) < 1e-6);
    }

    #[test]
    fn test_guard_strikes_enemy_near_objective() {
        let store = MemoryStore::new();
        let mut sim = make_sim(HeadlessConfig::default(), &store);
        let mut tough = Enemy::new(99, Point2::new(840.0, 360.0), 60.0, 1000.0);
        tough.size = 30.0;
        let report = sim.run_episode(tough);
        assert!(report.hits >= 1, "guard never connected: {:?}", report);
        assert!(report.gestures >= report.hits);
        assert!(sim.report().gestures[1] >= 1, "strikes are punches");
    }

    #[test]
    fn test_run_counts_every_episode() {
        let store = MemoryStore::new();
        let config = HeadlessConfig {
            episodes: 4,
            max_episode_ms: 20_000,
            seed: 42,
            ..Default::default()
        };
        let mut sim = make_sim(config, &store);
        let report = sim.run();
        assert_eq!(report.episodes, 4);
        assert_eq!(report.kills + report.breaches + report.timeouts, 4);
        assert!(report.states > 0);
        assert_eq!(
            sim.pilot().agent().stats().episodes,
            u64::from(report.kills + report.breaches)
        );
        assert!(report.status_sexp().starts_with("(:episodes 4"));
    }
}
