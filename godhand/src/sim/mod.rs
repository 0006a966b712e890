//! Headless simulation driving tracking, gestures and the learned enemy
//! together without a camera or display.

pub mod headless;

pub use headless::{
    EpisodeOutcome, EpisodeReport, GuardHand, HeadlessConfig, Simulation, SimulationReport,
};
