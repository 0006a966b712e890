//! Godhand: gesture-driven combat and a learned enemy.
//!
//! Hand landmarks come in through `tracking`, which turns them into
//! cooldown-gated gestures and pinch drags.  `rl` steers the boss enemy
//! with a tabular Q-learning agent whose model persists between runs.
//! `sim` wires both into a headless frame loop.

pub mod clock;
pub mod geometry;
pub mod rl;
pub mod sim;
pub mod tracking;
